//! Ollama runtime client.
//! Connection pooling via reqwest; `/api/generate` for completions,
//! `/api/tags` for the health probe. No retries here: retrying is the
//! request client's job.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Generation, GenerateRequest, GenerationStats, ModelRuntime, RuntimeError};
use crate::config::RuntimeConfig;

pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    health_timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| RuntimeError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            health_timeout: config.health_timeout(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ModelRuntime for OllamaClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<Generation, RuntimeError> {
        debug!(model = %request.model, prompt_len = request.prompt.len(), "ollama generate");
        let response = self
            .http
            .post(self.url("/api/generate"))
            .json(request)
            .send()
            .await
            .map_err(map_transport)?;

        let response = check_status(response).await?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RuntimeError::Decode(e.to_string()))?;

        Ok(Generation {
            stats: body.stats(),
            text: body.response,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, RuntimeError> {
        let response = self
            .http
            .get(self.url("/api/tags"))
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(map_transport)?;

        let response = check_status(response).await?;
        let body: TagsResponse = response
            .json()
            .await
            .map_err(|e| RuntimeError::Decode(e.to_string()))?;
        Ok(body.models.into_iter().map(|m| m.name).collect())
    }
}

fn map_transport(e: reqwest::Error) -> RuntimeError {
    if e.is_timeout() {
        RuntimeError::Timeout
    } else {
        RuntimeError::Transport(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RuntimeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RuntimeError::Status {
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
    })
}

// --- Ollama response types ---

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    /// Durations are nanoseconds.
    #[serde(default)]
    total_duration: u64,
    #[serde(default)]
    load_duration: u64,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
    #[serde(default)]
    eval_duration: u64,
}

impl GenerateResponse {
    fn stats(&self) -> GenerationStats {
        let tokens_per_second = if self.eval_duration > 0 {
            self.eval_count as f64 / (self.eval_duration as f64 / 1e9)
        } else {
            0.0
        };
        GenerationStats {
            total_duration_ms: self.total_duration as f64 / 1e6,
            load_duration_ms: self.load_duration as f64 / 1e6,
            prompt_tokens: self.prompt_eval_count,
            completion_tokens: self.eval_count,
            tokens_per_second,
        }
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}
