//! HTTP-facing error type.
//! Every error renders as `{"success": false, "error": "<message>"}`; server
//! errors never expose internals.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::translate::TranslateError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error("Not found")]
    NotFound,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Too many requests, please try again later.")]
    RateLimited { retry_after: u64 },

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Translate(e) if e.is_invalid_input() => StatusCode::BAD_REQUEST,
            Self::Translate(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::Internal(detail) => tracing::error!(detail = %detail, "internal error"),
            e if status.is_server_error() => tracing::warn!(error = %e, "request failed"),
            e => tracing::debug!(error = %e, status = status.as_u16(), "request rejected"),
        }

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));

        if let Self::RateLimited { retry_after } = self {
            return (
                status,
                [("Retry-After", retry_after.to_string())],
                body,
            )
                .into_response();
        }
        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::Validation(rejection.body_text())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            ApiError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TranslateError::InvalidInput("x".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TranslateError::EmptyOutput).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::RateLimited { retry_after: 3 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn internal_detail_is_hidden() {
        let err = ApiError::Internal("db password wrong".into());
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["Retry-After"], "42");
    }
}
