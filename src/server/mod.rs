//! HTTP surface of the proxy service.

pub mod handlers;
pub mod rate_limit;

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::error::ApiError;
use crate::translate::TranslationService;
use rate_limit::{rate_limit_middleware, RateLimiter};

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TranslationService>,
}

impl AppState {
    pub fn new(service: Arc<TranslationService>) -> Self {
        Self { service }
    }
}

/// Build the full router: API routes under the configured prefix, plus
/// rate limiting, body limit, panic isolation, CORS and request tracing.
pub fn router(state: AppState, config: &Config, limiter: RateLimiter) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/translate", post(handlers::translate))
        .route("/translate/batch", post(handlers::translate_batch))
        .route("/languages", get(handlers::languages))
        .route("/cache/stats", get(handlers::cache_stats))
        .route("/cache", delete(handlers::clear_cache))
        .route("/metrics", get(handlers::metrics))
        .with_state(state);

    let prefix = config.server.api_prefix.trim_end_matches('/');
    let app = if prefix.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(prefix, api)
    };

    app.fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(detail).into_response()
}
