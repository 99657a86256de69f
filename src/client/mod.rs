//! Request client for the proxy service.
//!
//! Turns arbitrary text into proxy calls: short text goes to the single
//! endpoint with retries, long text is segmented and translated piecewise,
//! and whole documents are filtered and sent in batches, then overlaid with
//! bilingual blocks.

pub mod document;
pub mod filter;
pub mod retry;
pub mod segment;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::translate::{BatchRequest, BatchResponse, TranslateRequest, TranslateResponse};
use document::Document;
use filter::should_translate;
use retry::{retry, RetryPolicy};
use segment::split_text;
use transport::{HttpTransport, TranslateTransport};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("proxy unreachable: {0}")]
    Transport(String),
    #[error("proxy request timed out")]
    Timeout,
    #[error("proxy returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("translation rejected: {0}")]
    Rejected(String),
    #[error("invalid proxy response: {0}")]
    Decode(String),
    #[error("{0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Model to request; `None` lets the proxy pick its default.
    pub model: Option<String>,
    /// Longer texts are segmented instead of sent whole.
    pub max_direct_chars: usize,
    pub segment_chars: usize,
    /// Pause between consecutive segments.
    pub segment_delay: Duration,
    pub max_batch_items: usize,
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            model: None,
            max_direct_chars: 10_000,
            segment_chars: 5_000,
            segment_delay: Duration::from_millis(500),
            max_batch_items: 50,
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of translating one text. On failure `translation` holds the
/// original text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextTranslation {
    pub success: bool,
    pub translation: String,
    pub error: Option<String>,
    pub from_cache: bool,
}

impl TextTranslation {
    fn failed(original: &str, error: String) -> Self {
        Self {
            success: false,
            translation: original.to_string(),
            error: Some(error),
            from_cache: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentReport {
    pub translated_count: usize,
    pub total_candidates: usize,
}

pub struct ProxyClient {
    transport: Arc<dyn TranslateTransport>,
    options: ClientOptions,
}

impl ProxyClient {
    pub fn new(transport: Arc<dyn TranslateTransport>, options: ClientOptions) -> Self {
        Self { transport, options }
    }

    /// Client over HTTP against `base_url` (the proxy's API prefix included).
    pub fn http(
        base_url: &str,
        timeout: Duration,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(base_url, timeout)?;
        Ok(Self::new(Arc::new(transport), options))
    }

    /// Translate `text`, segmenting it first when it is too long for one call.
    pub async fn translate_text(&self, text: &str, source: &str, target: &str) -> TextTranslation {
        if text.chars().count() > self.options.max_direct_chars {
            return self.split_and_translate(text, source, target).await;
        }
        self.translate_direct(text, source, target).await
    }

    /// Translate `text` segment by segment. Segments that fail are kept
    /// untranslated, so the result always reports success.
    pub async fn split_and_translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> TextTranslation {
        let segments = split_text(text, self.options.segment_chars);
        let total = segments.len();
        info!(chars = text.chars().count(), segments = total, "translating in segments");

        let mut translation = String::with_capacity(text.len());
        let mut from_cache = true;
        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.options.segment_delay).await;
            }
            let result = self.translate_direct(segment, source, target).await;
            if !result.success {
                warn!(segment = i, total, error = ?result.error, "segment left untranslated");
            }
            from_cache &= result.from_cache;
            translation.push_str(&result.translation);
        }

        TextTranslation {
            success: true,
            translation,
            error: None,
            from_cache: from_cache && total > 0,
        }
    }

    /// One batch call; input size is checked before anything is sent.
    pub async fn batch_translate(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> Result<BatchResponse, ClientError> {
        if texts.is_empty() {
            return Err(ClientError::InvalidInput("Texts array is required".into()));
        }
        if texts.len() > self.options.max_batch_items {
            return Err(ClientError::InvalidInput(format!(
                "Maximum {} texts per batch",
                self.options.max_batch_items
            )));
        }

        let request = BatchRequest {
            texts: texts.to_vec(),
            source_lang: Some(source.to_string()),
            target_lang: Some(target.to_string()),
            model: self.options.model.clone(),
        };
        let response = self.transport.translate_batch(&request).await?;
        if !response.success {
            return Err(ClientError::Rejected(
                response.error.unwrap_or_else(|| "batch failed".into()),
            ));
        }
        Ok(response)
    }

    /// Translate every eligible text node of `doc` into `target` and replace
    /// each translated node with an original-over-translation block.
    /// A failed batch call leaves its nodes untouched.
    pub async fn translate_document<D: Document>(&self, doc: &mut D, target: &str) -> DocumentReport {
        let candidates: Vec<(usize, String)> = doc
            .text_nodes()
            .into_iter()
            .filter(|node| should_translate(&node.text))
            .map(|node| (node.id, node.text.trim().to_string()))
            .collect();

        let mut report = DocumentReport {
            translated_count: 0,
            total_candidates: candidates.len(),
        };

        for chunk in candidates.chunks(self.options.max_batch_items.max(1)) {
            let texts: Vec<String> = chunk.iter().map(|(_, text)| text.clone()).collect();
            let response = match self.batch_translate(&texts, "auto", target).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, nodes = chunk.len(), "document batch failed");
                    continue;
                }
            };

            for item in response.results.iter().filter(|item| item.success) {
                let Some((id, original)) = chunk.get(item.index) else {
                    debug!(index = item.index, "batch result index out of range");
                    continue;
                };
                if doc.replace_with_bilingual(*id, original, &item.translation) {
                    report.translated_count += 1;
                }
            }
        }

        info!(
            translated = report.translated_count,
            candidates = report.total_candidates,
            "document translated"
        );
        report
    }

    /// Single endpoint with retries; gives back the original text on failure.
    async fn translate_direct(&self, text: &str, source: &str, target: &str) -> TextTranslation {
        if text.trim().is_empty() {
            return TextTranslation::failed(text, "Text is required".into());
        }

        let request = TranslateRequest {
            text: text.to_string(),
            source_lang: Some(source.to_string()),
            target_lang: Some(target.to_string()),
            model: self.options.model.clone(),
        };
        let request = &request;
        let result = retry(&self.options.retry, |attempt| async move {
            debug!(attempt, chars = request.text.chars().count(), "translate request");
            let response = self.transport.translate(request).await?;
            accepted(response)
        })
        .await;

        match result {
            Ok((translation, from_cache)) => TextTranslation {
                success: true,
                translation,
                error: None,
                from_cache,
            },
            Err(e) => {
                warn!(error = %e, "translation failed after retries");
                TextTranslation::failed(text, e.to_string())
            }
        }
    }
}

/// A `success: false` body counts as a failed attempt.
fn accepted(response: TranslateResponse) -> Result<(String, bool), ClientError> {
    match response.translation {
        Some(translation) if response.success => Ok((translation, response.from_cache)),
        _ => Err(ClientError::Rejected(
            response.error.unwrap_or_else(|| "Translation failed".into()),
        )),
    }
}
