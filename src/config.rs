//! Service configuration.
//! Loaded from `config/default.toml`, `config/{LINGO_RELAY_ENV}.toml`, then
//! `LINGO_RELAY__SECTION__KEY` environment variables. Every field has a default.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub runtime: RuntimeConfig,
    pub cache: CacheConfig,
    pub limits: LimitsConfig,
    pub rate_limit: RateLimitConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prefix shared by every route, e.g. `/api`.
    pub api_prefix: String,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            api_prefix: "/api".to_string(),
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Downstream model runtime (Ollama-compatible).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub base_url: String,
    pub default_model: String,
    pub request_timeout_secs: u64,
    pub health_timeout_secs: u64,
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: "qwen2:7b".to_string(),
            request_timeout_secs: 30,
            health_timeout_secs: 5,
            temperature: 0.3,
            top_p: 0.9,
            num_predict: 2048,
        }
    }
}

impl RuntimeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    /// Model family used by the health probe, e.g. `qwen2` for `qwen2:7b`.
    pub fn model_family(&self) -> &str {
        self.default_model
            .split(':')
            .next()
            .unwrap_or(&self.default_model)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// Zero disables caching entirely.
    pub capacity: usize,
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 3600,
            capacity: 10_000,
            sweep_interval_secs: 600,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Input validation and batch fan-out limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_text_chars: usize,
    pub max_batch_items: usize,
    pub batch_group_size: usize,
    pub batch_group_delay_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_text_chars: 10_000,
            max_batch_items: 50,
            batch_group_size: 5,
            batch_group_delay_ms: 100,
        }
    }
}

impl LimitsConfig {
    pub fn batch_group_delay(&self) -> Duration {
        Duration::from_millis(self.batch_group_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    /// Key clients by `X-Forwarded-For`/`X-Real-IP`. Only enable behind a
    /// proxy that overwrites these headers.
    pub trust_forwarded: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 60,
            trust_forwarded: false,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("LINGO_RELAY_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("LINGO_RELAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
