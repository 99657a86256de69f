//! Shared fixtures for the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;

use lingo_relay::config::Config;
use lingo_relay::metrics::MetricsRegistry;
use lingo_relay::server::{self, rate_limit::RateLimiter, AppState};
use lingo_relay::translate::cache::TranslationCache;
use lingo_relay::translate::prompt::TEXT_MARKER;
use lingo_relay::translate::{
    Generation, GenerateRequest, GenerationStats, ModelRuntime, RuntimeError, TranslationService,
};

/// Wraps the source text in angle brackets; texts in `failing` error out
/// and texts in `panicking` panic.
#[derive(Default)]
pub struct EchoRuntime {
    pub calls: AtomicUsize,
    pub failing: HashSet<String>,
    pub panicking: HashSet<String>,
    pub offline: bool,
}

#[async_trait]
impl ModelRuntime for EchoRuntime {
    async fn generate(&self, request: &GenerateRequest) -> Result<Generation, RuntimeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let source = request
            .prompt
            .split(TEXT_MARKER)
            .nth(1)
            .unwrap_or_default()
            .trim()
            .to_string();
        if self.failing.contains(&source) {
            return Err(RuntimeError::Transport("connection refused".into()));
        }
        if self.panicking.contains(&source) {
            panic!("runtime state corrupted at /srv/secret/model.bin");
        }
        Ok(Generation {
            text: format!("<{source}>"),
            stats: GenerationStats::default(),
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, RuntimeError> {
        if self.offline {
            return Err(RuntimeError::Transport("connection refused".into()));
        }
        Ok(vec!["qwen2:7b".into(), "llama3:8b".into()])
    }
}

pub struct TestApp {
    pub router: Router,
    pub runtime: Arc<EchoRuntime>,
    pub cache: Arc<TranslationCache>,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.limits.batch_group_delay_ms = 0;
    config
}

pub fn create_app(runtime: EchoRuntime, config: Config) -> TestApp {
    let runtime = Arc::new(runtime);
    let cache = Arc::new(TranslationCache::new(
        config.cache.capacity,
        config.cache.ttl(),
    ));
    let service = TranslationService::new(
        runtime.clone(),
        cache.clone(),
        Arc::new(MetricsRegistry::new()),
        config.runtime.clone(),
        config.limits.clone(),
    );
    let limiter = RateLimiter::new(&config.rate_limit);
    let router = server::router(AppState::new(Arc::new(service)), &config, limiter);
    TestApp {
        router,
        runtime,
        cache,
    }
}
