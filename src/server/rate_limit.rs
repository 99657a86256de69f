//! Per-client request limiting: at most `max_requests` within any rolling
//! window, keyed by client IP.

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: u64 },
}

#[derive(Clone)]
pub struct RateLimiter {
    /// Admission times per client, oldest first, all within the last window.
    clients: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    max_requests: u32,
    window: Duration,
    trust_forwarded: bool,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            max_requests: config.max_requests,
            window: config.window(),
            trust_forwarded: config.trust_forwarded,
        }
    }

    /// Count a request against `key` and decide whether it may proceed.
    pub fn check(&self, key: &str) -> Decision {
        let now = Instant::now();
        let mut clients = self.clients.lock();
        let log = clients.entry(key.to_string()).or_default();
        self.trim(log, now);

        if log.len() >= self.max_requests as usize {
            // the oldest admission leaving the window frees the next slot
            let retry_after = log.front().map_or(self.window, |oldest| {
                self.window.saturating_sub(now.duration_since(*oldest))
            });
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            return Decision::Limited {
                retry_after: secs.max(1),
            };
        }

        log.push_back(now);
        Decision::Allowed {
            remaining: self.max_requests - log.len() as u32,
        }
    }

    fn trim(&self, log: &mut VecDeque<Instant>, now: Instant) {
        while log
            .front()
            .is_some_and(|at| now.duration_since(*at) >= self.window)
        {
            log.pop_front();
        }
    }

    /// Forget clients with no admissions inside the window.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut clients = self.clients.lock();
        let before = clients.len();
        clients.retain(|_, log| {
            self.trim(log, now);
            !log.is_empty()
        });
        before - clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn start_pruner(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let limiter = self.clone();
        let period = self.window.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let pruned = limiter.prune();
                        if pruned > 0 {
                            debug!(pruned, "rate limit windows pruned");
                        }
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
        })
    }
}

/// Extract client IP: forwarding headers first when trusted, then the peer
/// address.
fn client_key(req: &Request<Body>, trust_forwarded: bool) -> String {
    let forwarded = || {
        req.headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
    };
    let real_ip = || {
        req.headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
    };
    let peer = || {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    };

    let from_headers = if trust_forwarded {
        forwarded().or_else(real_ip)
    } else {
        None
    };
    from_headers
        .or_else(peer)
        .map_or_else(|| "unknown".to_string(), |ip| ip.to_string())
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_key(&req, limiter.trust_forwarded);
    match limiter.check(&key) {
        Decision::Allowed { remaining } => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", limiter.max_requests.into());
            headers.insert("x-ratelimit-remaining", remaining.into());
            Ok(response)
        }
        Decision::Limited { retry_after } => {
            debug!(client = %key, retry_after, "rate limited");
            Err(ApiError::RateLimited { retry_after })
        }
    }
}
