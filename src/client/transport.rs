//! Wire access to the proxy service.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::ClientError;
use crate::translate::{BatchRequest, BatchResponse, TranslateRequest, TranslateResponse};

/// One round trip to the proxy per call; no retries at this layer.
#[async_trait]
pub trait TranslateTransport: Send + Sync {
    async fn translate(&self, request: &TranslateRequest)
        -> Result<TranslateResponse, ClientError>;

    async fn translate_batch(&self, request: &BatchRequest)
        -> Result<BatchResponse, ClientError>;
}

/// reqwest transport against a running proxy, e.g. `http://localhost:3001/api`.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, "proxy request");
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TranslateTransport for HttpTransport {
    async fn translate(
        &self,
        request: &TranslateRequest,
    ) -> Result<TranslateResponse, ClientError> {
        self.post("/translate", request).await
    }

    async fn translate_batch(&self, request: &BatchRequest) -> Result<BatchResponse, ClientError> {
        self.post("/translate/batch", request).await
    }
}

fn map_transport(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Transport(e.to_string())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// The proxy's `error` field when the body is its JSON error shape,
/// otherwise the raw body cut to 200 chars.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error,
        Err(_) => body.chars().take(200).collect(),
    }
}
