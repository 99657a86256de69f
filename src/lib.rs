//! lingo-relay: caching, batching translation proxy in front of a local LLM
//! runtime, plus the retrying client that feeds it documents.
//! Library entry: tracing setup, service wiring, server lifecycle.

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;
pub mod translate;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use config::Config;
use metrics::MetricsRegistry;
use server::rate_limit::RateLimiter;
use server::AppState;
use translate::cache::TranslationCache;
use translate::ollama::OllamaClient;
use translate::TranslationService;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Install the global subscriber. `RUST_LOG` overrides the default filter;
/// `LINGO_RELAY_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lingo_relay=debug,tower_http=info"));
    let json = std::env::var("LINGO_RELAY_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Build the service from `config` and serve until SIGINT/SIGTERM.
pub async fn run(config: Config) -> Result<(), BoxError> {
    info!(
        runtime = %config.runtime.base_url,
        model = %config.runtime.default_model,
        "lingo-relay starting"
    );

    let shutdown = CancellationToken::new();
    let cache = Arc::new(TranslationCache::new(
        config.cache.capacity,
        config.cache.ttl(),
    ));
    let metrics = Arc::new(MetricsRegistry::new());
    let runtime = Arc::new(OllamaClient::new(&config.runtime)?);
    let service = Arc::new(TranslationService::new(
        runtime,
        cache.clone(),
        metrics,
        config.runtime.clone(),
        config.limits.clone(),
    ));

    let sweeper = TranslationCache::start_sweeper(
        cache.clone(),
        config.cache.sweep_interval(),
        shutdown.clone(),
    );
    let limiter = RateLimiter::new(&config.rate_limit);
    let pruner = limiter.start_pruner(shutdown.clone());

    let app = server::router(AppState::new(service), &config, limiter);
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, prefix = %config.server.api_prefix, "listening");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    shutdown.cancel();
    for (name, task) in [("sweeper", sweeper), ("pruner", pruner)] {
        if let Err(e) = task.await {
            warn!(task = name, error = %e, "background task ended abnormally");
        }
    }
    let cleared = cache.clear();
    info!(cleared, "shutdown complete");

    served?;
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
