//! Route handlers. Thin: parse, call the service, shape the JSON.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::metrics::MetricSummary;
use crate::translate::{
    prompt::LANGUAGES, BatchRequest, BatchResponse, TranslateRequest, TranslateResponse,
    DEFAULT_TARGET_LANG,
};

pub async fn health(State(state): State<AppState>) -> Response {
    let report = state.service.health().await;
    let timestamp = chrono::Utc::now().to_rfc3339();

    if report.connected {
        Json(json!({
            "status": "healthy",
            "ollama_connected": true,
            "models_available": report.models.len(),
            "models": report.models,
            "qwen2_available": report.model_available,
            "cache_keys": report.cache_keys,
            "timestamp": timestamp,
        }))
        .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "ollama_connected": false,
                "error": report.error,
                "cache_keys": report.cache_keys,
                "timestamp": timestamp,
            })),
        )
            .into_response()
    }
}

pub async fn translate(
    State(state): State<AppState>,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> ApiResult<Json<TranslateResponse>> {
    let Json(request) = payload?;
    let outcome = state.service.translate(&request).await?;
    Ok(Json(outcome.into()))
}

pub async fn translate_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> ApiResult<Json<BatchResponse>> {
    let Json(request) = payload?;
    let started = Instant::now();
    let results = state
        .service
        .translate_batch(
            &request.texts,
            request.source_lang.as_deref(),
            request.target_lang.as_deref(),
            request.model.as_deref(),
        )
        .await?;

    Ok(Json(BatchResponse {
        success: true,
        total_texts: results.len(),
        results,
        processing_time: started.elapsed().as_millis() as u64,
        error: None,
    }))
}

pub async fn languages() -> Json<Value> {
    let supported: BTreeMap<&str, &str> = LANGUAGES
        .iter()
        .map(|lang| (lang.code, lang.name))
        .collect();
    Json(json!({
        "supported_languages": supported,
        "default_target": DEFAULT_TARGET_LANG,
    }))
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<Value> {
    let stats = state.service.cache().stats();
    Json(json!({
        "success": true,
        "keys_count": stats.keys,
        "stats": stats,
    }))
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    let cleared = state.service.clear_cache();
    Json(json!({
        "success": cleared,
        "message": "Cache cleared",
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Json<HashMap<String, MetricSummary>> {
    Json(state.service.metrics().summary())
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
