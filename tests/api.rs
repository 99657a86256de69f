//! HTTP API integration tests.
//!
//! Drive the full router (middleware included) with a fake model runtime.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::collections::HashSet;
use std::sync::atomic::Ordering;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{create_app, test_config, EchoRuntime};
use lingo_relay::translate::cache::{CachedTranslation, TranslationCache};

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn translate_then_serve_from_cache() {
    let app = create_app(EchoRuntime::default(), test_config());

    let (status, body) = send(
        &app.router,
        post_json("/api/translate", json!({ "text": "Hello", "source_lang": "en" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["translation"], "<Hello>");
    assert_eq!(body["model"], "qwen2:7b");
    assert_eq!(body["from_cache"], false);

    let (_, body) = send(
        &app.router,
        post_json("/api/translate", json!({ "text": "Hello", "source_lang": "en" })),
    )
    .await;
    assert_eq!(body["from_cache"], true);
    assert_eq!(app.runtime.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn prepopulated_cache_skips_runtime() {
    let app = create_app(EchoRuntime::default(), test_config());
    let key = TranslationCache::compute_key("qwen2:7b", "auto", "zh-tw", "Hello");
    app.cache.insert(
        key,
        CachedTranslation {
            translation: "你好".into(),
            model: "qwen2:7b".into(),
            stats: None,
        },
    );

    let (status, body) = send(&app.router, post_json("/api/translate", json!({ "text": "Hello" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["translation"], "你好");
    assert_eq!(body["from_cache"], true);
    assert_eq!(app.runtime.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn translate_validation_errors_are_400() {
    let app = create_app(EchoRuntime::default(), test_config());

    for text in [String::new(), "   ".to_string(), "a".repeat(10_001)] {
        let (status, body) =
            send(&app.router, post_json("/api/translate", json!({ "text": text }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/translate")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app.router, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(app.runtime.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn runtime_failure_is_500_with_message() {
    let runtime = EchoRuntime {
        failing: HashSet::from(["boom".to_string()]),
        ..EchoRuntime::default()
    };
    let app = create_app(runtime, test_config());

    let (status, body) = send(&app.router, post_json("/api/translate", json!({ "text": "boom" }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn batch_keeps_order_and_isolates_failures() {
    let runtime = EchoRuntime {
        failing: HashSet::from(["b".to_string()]),
        ..EchoRuntime::default()
    };
    let app = create_app(runtime, test_config());

    let (status, body) = send(
        &app.router,
        post_json("/api/translate/batch", json!({ "texts": ["a", "b", "c"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["total_texts"], 3);
    assert!(body["processing_time"].is_u64());

    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["index"], 0);
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["translation"], "<a>");
    assert_eq!(results[1]["index"], 1);
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[1]["translation"], "b");
    assert!(results[1]["error"].is_string());
    assert_eq!(results[2]["translation"], "<c>");
}

#[tokio::test]
async fn batch_size_is_validated() {
    let app = create_app(EchoRuntime::default(), test_config());

    let (status, body) = send(&app.router, post_json("/api/translate/batch", json!({ "texts": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let texts: Vec<String> = (0..51).map(|i| format!("text {i}")).collect();
    let (status, _) = send(&app.router, post_json("/api/translate/batch", json!({ "texts": texts }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.runtime.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn languages_lists_supported_targets() {
    let app = create_app(EchoRuntime::default(), test_config());

    let (status, body) = send(&app.router, get("/api/languages")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["default_target"], "zh-tw");
    let supported = body["supported_languages"].as_object().unwrap();
    for code in ["zh-tw", "zh-cn", "en", "ja", "ko", "fr", "de", "es"] {
        assert!(supported.contains_key(code), "missing {code}");
    }
}

#[tokio::test]
async fn cache_stats_and_clear() {
    let app = create_app(EchoRuntime::default(), test_config());
    send(&app.router, post_json("/api/translate", json!({ "text": "Hello" }))).await;

    let (status, body) = send(&app.router, get("/api/cache/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["keys_count"], 1);
    assert_eq!(body["stats"]["misses"], 1);

    let clear = Request::builder()
        .method("DELETE")
        .uri("/api/cache")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, clear).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Cache cleared");
    assert!(app.cache.is_empty());
}

#[tokio::test]
async fn health_reports_runtime_state() {
    let app = create_app(EchoRuntime::default(), test_config());
    let (status, body) = send(&app.router, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["ollama_connected"], true);
    assert_eq!(body["models_available"], 2);
    assert_eq!(body["qwen2_available"], true);
    assert!(body["timestamp"].is_string());

    let offline = create_app(
        EchoRuntime {
            offline: true,
            ..EchoRuntime::default()
        },
        test_config(),
    );
    let (status, body) = send(&offline.router, get("/api/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["ollama_connected"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn metrics_reports_translate_latency() {
    let app = create_app(EchoRuntime::default(), test_config());
    send(&app.router, post_json("/api/translate", json!({ "text": "Hello" }))).await;

    let (status, body) = send(&app.router, get("/api/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["translate_done"]["count"], 1);
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let app = create_app(EchoRuntime::default(), test_config());
    let (status, body) = send(&app.router, get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "success": false, "error": "Not found" }));
}

#[tokio::test]
async fn rate_limit_rejects_excess_requests() {
    let mut config = test_config();
    config.rate_limit.max_requests = 2;
    config.rate_limit.trust_forwarded = true;
    let app = create_app(EchoRuntime::default(), config);

    let forwarded = |ip: &str| {
        Request::builder()
            .uri("/api/languages")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..2 {
        let (status, _) = send(&app.router, forwarded("10.0.0.1")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let response = app.router.clone().oneshot(forwarded("10.0.0.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Too many requests, please try again later.");

    // a different client has its own window
    let (status, _) = send(&app.router, forwarded("10.0.0.2")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn oversized_body_is_413() {
    let mut config = test_config();
    config.server.body_limit_bytes = 1024;
    let app = create_app(EchoRuntime::default(), config);

    let body = json!({ "text": "a".repeat(4096) }).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/api/translate")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap();
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.runtime.calls.load(Ordering::SeqCst), 0);

    // bodies under the cap still go through
    let (status, _) = send(&app.router, post_json("/api/translate", json!({ "text": "Hello" }))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn handler_panic_is_generic_500() {
    let runtime = EchoRuntime {
        panicking: HashSet::from(["explode".to_string()]),
        ..EchoRuntime::default()
    };
    let app = create_app(runtime, test_config());

    let (status, body) = send(&app.router, post_json("/api/translate", json!({ "text": "explode" }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "success": false, "error": "Internal server error" })
    );

    // the server keeps serving afterwards
    let (status, _) = send(&app.router, get("/api/languages")).await;
    assert_eq!(status, StatusCode::OK);
}
