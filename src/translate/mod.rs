//! Translation pipeline: validation, cache lookup, prompt, runtime call, cleanup.
//! The model runtime sits behind the `ModelRuntime` trait so the service can be
//! driven by Ollama in production and by fakes in tests.

pub mod batch;
pub mod cache;
pub mod normalize;
pub mod ollama;
pub mod prompt;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};

use crate::config::{LimitsConfig, RuntimeConfig};
use crate::metrics::{metric_names, MetricsRegistry};
use cache::{CachedTranslation, TranslationCache};

pub const DEFAULT_SOURCE_LANG: &str = "auto";
pub const DEFAULT_TARGET_LANG: &str = "zh-tw";

// --- Wire types shared by the HTTP layer and the request client ---

/// Body of `POST /translate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Response of `POST /translate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<GenerationStats>,
    #[serde(default)]
    pub from_cache: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `POST /translate/batch`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    pub texts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// One entry of a batch response. Failed items carry the original text
/// as `translation` so callers can fall back to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub index: usize,
    pub success: bool,
    pub translation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub from_cache: bool,
}

/// Response of `POST /translate/batch`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResponse {
    pub success: bool,
    #[serde(default)]
    pub results: Vec<BatchItem>,
    #[serde(default)]
    pub total_texts: usize,
    /// Milliseconds.
    #[serde(default)]
    pub processing_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runtime timing and token usage for one generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub total_duration_ms: f64,
    pub load_duration_ms: f64,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub tokens_per_second: f64,
}

// --- Runtime seam ---

/// Parameters for a single completion call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerateOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: u32,
    pub stop: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub stats: GenerationStats,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("model runtime timed out")]
    Timeout,
    #[error("model runtime returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model runtime unreachable: {0}")]
    Transport(String),
    #[error("invalid model runtime response: {0}")]
    Decode(String),
}

/// Text-completion backend (adapter for different runtimes).
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<Generation, RuntimeError>;

    /// Names of the models the runtime can serve.
    async fn list_models(&self) -> Result<Vec<String>, RuntimeError>;
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("translation timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("translation failed: {0}")]
    Runtime(String),
    #[error("model returned an empty translation")]
    EmptyOutput,
}

impl TranslateError {
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, TranslateError::InvalidInput(_))
    }
}

/// Successful translation, fresh or cached.
#[derive(Debug, Clone)]
pub struct TranslateOutcome {
    pub translation: String,
    pub model: String,
    pub stats: Option<GenerationStats>,
    pub from_cache: bool,
    pub detected_lang: Option<String>,
}

impl From<TranslateOutcome> for TranslateResponse {
    fn from(outcome: TranslateOutcome) -> Self {
        Self {
            success: true,
            translation: Some(outcome.translation),
            model: Some(outcome.model),
            stats: outcome.stats,
            from_cache: outcome.from_cache,
            detected_lang: outcome.detected_lang,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub connected: bool,
    pub models: Vec<String>,
    pub model_available: bool,
    pub cache_keys: usize,
    pub error: Option<String>,
}

/// Proxy-side translation service. Owns the cache; shared behind an `Arc`.
pub struct TranslationService {
    runtime: Arc<dyn ModelRuntime>,
    cache: Arc<TranslationCache>,
    metrics: Arc<MetricsRegistry>,
    runtime_config: RuntimeConfig,
    limits: LimitsConfig,
}

impl TranslationService {
    pub fn new(
        runtime: Arc<dyn ModelRuntime>,
        cache: Arc<TranslationCache>,
        metrics: Arc<MetricsRegistry>,
        runtime_config: RuntimeConfig,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            runtime,
            cache,
            metrics,
            runtime_config,
            limits,
        }
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Probe the runtime's model listing.
    pub async fn health(&self) -> HealthReport {
        let probe = tokio::time::timeout(
            self.runtime_config.health_timeout(),
            self.runtime.list_models(),
        )
        .await;

        let cache_keys = self.cache.len();
        match probe {
            Ok(Ok(models)) => {
                let family = self.runtime_config.model_family();
                let model_available = models.iter().any(|name| name.starts_with(family));
                HealthReport {
                    connected: true,
                    models,
                    model_available,
                    cache_keys,
                    error: None,
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "health probe failed");
                HealthReport::unreachable(cache_keys, e.to_string())
            }
            Err(_) => {
                warn!("health probe timed out");
                HealthReport::unreachable(cache_keys, RuntimeError::Timeout.to_string())
            }
        }
    }

    /// Translate a single text, serving from cache when possible.
    pub async fn translate(
        &self,
        request: &TranslateRequest,
    ) -> Result<TranslateOutcome, TranslateError> {
        self.validate_text(&request.text)?;

        let model = request
            .model
            .as_deref()
            .unwrap_or(&self.runtime_config.default_model);
        let source_lang = request.source_lang.as_deref().unwrap_or(DEFAULT_SOURCE_LANG);
        let target_lang = request.target_lang.as_deref().unwrap_or(DEFAULT_TARGET_LANG);

        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("translate", %request_id, model, target_lang);
        self.translate_inner(&request.text, model, source_lang, target_lang)
            .instrument(span)
            .await
    }

    async fn translate_inner(
        &self,
        text: &str,
        model: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<TranslateOutcome, TranslateError> {
        let started = Instant::now();
        let detected_lang = if source_lang == DEFAULT_SOURCE_LANG {
            normalize::detect_language(text)
        } else {
            None
        };

        let key = TranslationCache::compute_key(model, source_lang, target_lang, text);
        if let Some(cached) = self.cache.get(&key) {
            debug!("cache hit");
            return Ok(TranslateOutcome {
                translation: cached.translation,
                model: cached.model,
                stats: cached.stats,
                from_cache: true,
                detected_lang,
            });
        }

        let generate = GenerateRequest {
            model: model.to_string(),
            prompt: prompt::build_prompt(text, target_lang),
            stream: false,
            options: GenerateOptions {
                temperature: self.runtime_config.temperature,
                top_p: self.runtime_config.top_p,
                num_predict: self.runtime_config.num_predict,
                stop: prompt::STOP_SEQUENCES.iter().map(|s| s.to_string()).collect(),
            },
        };

        let timeout = self.runtime_config.request_timeout();
        let runtime_span = self.metrics.span(metric_names::RUNTIME_CALL);
        let result = tokio::time::timeout(timeout, self.runtime.generate(&generate)).await;
        runtime_span.finish();
        let generation = match result {
            Ok(Ok(generation)) => generation,
            Ok(Err(RuntimeError::Timeout)) | Err(_) => {
                warn!(timeout_s = timeout.as_secs(), "runtime call timed out");
                return Err(TranslateError::Timeout(timeout));
            }
            Ok(Err(e)) => {
                warn!(error = %e, "runtime call failed");
                return Err(TranslateError::Runtime(e.to_string()));
            }
        };

        let translation = prompt::clean_output(&generation.text, target_lang);
        if translation.is_empty() {
            return Err(TranslateError::EmptyOutput);
        }

        self.cache.insert(
            key,
            CachedTranslation {
                translation: translation.clone(),
                model: model.to_string(),
                stats: Some(generation.stats.clone()),
            },
        );

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record(metric_names::TRANSLATE_DONE, elapsed_ms);
        info!(
            chars = text.chars().count(),
            completion_tokens = generation.stats.completion_tokens,
            elapsed_ms,
            "translation complete"
        );

        Ok(TranslateOutcome {
            translation,
            model: model.to_string(),
            stats: Some(generation.stats),
            from_cache: false,
            detected_lang,
        })
    }

    /// Empty the whole cache.
    pub fn clear_cache(&self) -> bool {
        let removed = self.cache.clear();
        info!(removed, "cache cleared");
        true
    }

    fn validate_text(&self, text: &str) -> Result<(), TranslateError> {
        if text.trim().is_empty() {
            return Err(TranslateError::InvalidInput("text is required".into()));
        }
        if text.chars().count() > self.limits.max_text_chars {
            return Err(TranslateError::InvalidInput(format!(
                "text too long (max {} characters)",
                self.limits.max_text_chars
            )));
        }
        Ok(())
    }
}

impl HealthReport {
    fn unreachable(cache_keys: usize, error: String) -> Self {
        Self {
            connected: false,
            models: Vec::new(),
            model_available: false,
            cache_keys,
            error: Some(error),
        }
    }
}
