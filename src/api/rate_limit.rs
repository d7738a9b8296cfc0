//! Per-client admission control.
//!
//! Two backends share one middleware: an in-process governor token bucket
//! keyed by client, or a fixed-window counter in the cache store so several
//! instances can share the budget.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request, Response},
    middleware::Next,
    response::IntoResponse,
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    middleware::StateInformationMiddleware,
    state::keyed::DashMapStateStore,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use super::middleware::bearer_token;
use crate::app::config::{RateLimitBackend, RateLimitConfig, RateLimitKey};
use crate::app::worker::MaintenanceTask;
use crate::domain::{AppError, CacheStore, ConfigError, TokenIssuer};
use crate::infra::observability::record_rate_limited;

type KeyedLimiter =
    RateLimiter<String, DashMapStateStore<String>, DefaultClock, StateInformationMiddleware>;

const CACHE_KEY_PREFIX: &str = "rate_limit:";

enum Backend {
    Memory(KeyedLimiter),
    Cache(Arc<dyn CacheStore>),
}

impl Backend {
    fn label(&self) -> &'static str {
        match self {
            Backend::Memory(_) => "memory",
            Backend::Cache(_) => "cache",
        }
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the key has its full budget again
    pub reset_after: Duration,
}

pub struct RateLimitState {
    backend: Backend,
    config: RateLimitConfig,
    tokens: Arc<dyn TokenIssuer>,
}

impl RateLimitState {
    /// Builds the limiter for `config.backend`.
    ///
    /// # Errors
    /// `InvalidValue` if the quota cannot be represented (zero requests or
    /// a zero window).
    pub fn new(
        config: RateLimitConfig,
        cache: Arc<dyn CacheStore>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Result<Self, ConfigError> {
        let backend = match config.backend {
            RateLimitBackend::Memory => Backend::Memory(memory_limiter(&config)?),
            RateLimitBackend::Cache => Backend::Cache(cache),
        };
        Ok(Self {
            backend,
            config,
            tokens,
        })
    }

    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Number of keys currently tracked in memory.
    pub fn tracked_keys(&self) -> usize {
        match &self.backend {
            Backend::Memory(limiter) => limiter.len(),
            Backend::Cache(_) => 0,
        }
    }

    /// Derives the limiter key for a request.
    pub fn key_for<B>(&self, request: &Request<B>) -> String {
        if self.config.key == RateLimitKey::User {
            if let Ok(user) = bearer_token(request.headers()).and_then(|t| self.tokens.verify(t)) {
                return format!("user:{}", user.user_id);
            }
        }
        format!(
            "ip:{}",
            client_ip_from_request(request, self.config.trust_proxy_headers)
        )
    }

    /// Counts one request against `key`. `None` means the backend failed
    /// and the request should be let through.
    pub async fn check(&self, key: &str) -> Option<Decision> {
        let limit = self.config.max_requests;
        match &self.backend {
            Backend::Memory(limiter) => match limiter.check_key(&key.to_string()) {
                Ok(snapshot) => {
                    let remaining = snapshot.remaining_burst_capacity();
                    Some(Decision {
                        allowed: true,
                        limit,
                        remaining,
                        reset_after: self.replenish_period() * (limit - remaining.min(limit)),
                    })
                }
                Err(not_until) => {
                    let wait = not_until.wait_time_from(DefaultClock::default().now());
                    Some(Decision {
                        allowed: false,
                        limit,
                        remaining: 0,
                        reset_after: wait,
                    })
                }
            },
            Backend::Cache(store) => {
                let cache_key = format!("{CACHE_KEY_PREFIX}{key}");
                match store.incr_window(&cache_key, self.config.window).await {
                    Ok(window) => {
                        let used = u32::try_from(window.count).unwrap_or(u32::MAX);
                        Some(Decision {
                            allowed: used <= limit,
                            limit,
                            remaining: limit.saturating_sub(used),
                            reset_after: window.resets_in,
                        })
                    }
                    Err(e) => {
                        warn!(key, error = %e, "Rate limit backend unavailable, failing open");
                        None
                    }
                }
            }
        }
    }

    fn replenish_period(&self) -> Duration {
        self.config.window / self.config.max_requests.max(1)
    }

    /// Drops idle in-memory buckets. Returns how many keys were removed.
    pub fn sweep(&self) -> usize {
        match &self.backend {
            Backend::Memory(limiter) => {
                let before = limiter.len();
                limiter.retain_recent();
                limiter.shrink_to_fit();
                before.saturating_sub(limiter.len())
            }
            // Redis expires windows on its own
            Backend::Cache(_) => 0,
        }
    }
}

fn memory_limiter(config: &RateLimitConfig) -> Result<KeyedLimiter, ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidValue {
        key: "RATE_LIMIT_MAX_REQUESTS".to_string(),
        message: message.to_string(),
    };
    let burst = NonZeroU32::new(config.max_requests).ok_or_else(|| invalid("must be positive"))?;
    let quota = Quota::with_period(config.window / config.max_requests)
        .ok_or_else(|| invalid("window too short for this many requests"))?
        .allow_burst(burst);
    Ok(RateLimiter::dashmap(quota).with_middleware::<StateInformationMiddleware>())
}

#[async_trait]
impl MaintenanceTask for RateLimitState {
    fn name(&self) -> &'static str {
        "rate_limit_sweep"
    }

    async fn run_once(&self) -> Result<usize, AppError> {
        Ok(self.sweep())
    }
}

/// Resolves the client address.
///
/// Proxy headers are only honoured when `trust_proxy` is set, since any
/// client can send them. Unknown clients share one bucket.
pub fn client_ip_from_request<B>(request: &Request<B>, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }
        let real_ip = request
            .headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok());
        if let Some(ip) = real_ip {
            return ip;
        }
    }
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

fn apply_headers(headers: &mut HeaderMap, decision: &Decision) {
    let reset_at = unix_now() + ceil_secs(decision.reset_after);
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(reset_at));
    if !decision.allowed {
        headers.insert(
            "retry-after",
            HeaderValue::from(ceil_secs(decision.reset_after).max(1)),
        );
    }
}

/// Rate limit middleware. Responds 429 in the envelope once a key is over
/// budget; always advertises the remaining quota.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let key = limiter.key_for(&request);
    let Some(decision) = limiter.check(&key).await else {
        return next.run(request).await;
    };

    if !decision.allowed {
        debug!(key = %key, retry_after = ?decision.reset_after, "Rate limit exceeded");
        record_rate_limited(limiter.backend.label());
        let mut response = AppError::RateLimited.into_response();
        apply_headers(response.headers_mut(), &decision);
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &decision);
    response
}
