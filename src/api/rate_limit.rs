//! Per-IP request rate limiting.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::{
    net::SocketAddr,
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, warn};

use crate::auth::AuthError;

pub const DEFAULT_REQUESTS: u32 = 50;
pub const DEFAULT_WINDOW_SECONDS: i64 = 30 * 60;

// Idle client buckets are dropped every this many checks.
const RETAIN_EVERY: u64 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check_ip(&self, ip: Option<&str>) -> RateLimitDecision;
}

pub type SharedRateLimiter = Arc<dyn RateLimiter>;

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_ip(&self, _ip: Option<&str>) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

/// Keyed GCRA limiter: each client IP may burst `requests` times and regains
/// one request every `window / requests`. Requests without an IP share one bucket.
pub struct KeyedRateLimiter<C: Clock = DefaultClock> {
    limiter: GovernorRateLimiter<
        String,
        DefaultKeyedStateStore<String>,
        C,
        NoOpMiddleware<<C as Clock>::Instant>,
    >,
    checks: AtomicU64,
}

impl<C: Clock> KeyedRateLimiter<C> {
    /// Returns `None` when `window / requests` rounds down to zero.
    #[must_use]
    pub fn with_clock(requests: NonZeroU32, window: Duration, clock: &C) -> Option<Self> {
        let quota = Quota::with_period(window / requests.get())?.allow_burst(requests);
        Some(Self {
            limiter: GovernorRateLimiter::dashmap_with_clock(quota, clock),
            checks: AtomicU64::new(0),
        })
    }

    fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

impl<C> RateLimiter for KeyedRateLimiter<C>
where
    C: Clock + Send + Sync,
    C::Instant: Send + Sync,
{
    fn check_ip(&self, ip: Option<&str>) -> RateLimitDecision {
        let key = ip.unwrap_or("unknown").to_string();
        let decision = match self.limiter.check_key(&key) {
            Ok(()) => RateLimitDecision::Allowed,
            Err(_) => RateLimitDecision::Limited,
        };

        if self.checks.fetch_add(1, Ordering::Relaxed) % RETAIN_EVERY == RETAIN_EVERY - 1 {
            self.limiter.retain_recent();
            debug!(clients = self.tracked_clients(), "pruned idle rate limit buckets");
        }
        decision
    }
}

/// Build the limiter from configuration; zero requests disables limiting.
#[must_use]
pub fn from_config(requests: u32, window_seconds: i64) -> SharedRateLimiter {
    let window = u64::try_from(window_seconds)
        .ok()
        .filter(|seconds| *seconds > 0)
        .map(Duration::from_secs);
    let limiter = NonZeroU32::new(requests).zip(window).and_then(|(requests, window)| {
        KeyedRateLimiter::with_clock(requests, window, &DefaultClock::default())
    });
    match limiter {
        Some(limiter) => Arc::new(limiter),
        None => Arc::new(NoopRateLimiter),
    }
}

/// Extract a client IP for rate limiting from common proxy headers, falling
/// back to the socket peer.
#[must_use]
pub fn extract_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// axum middleware rejecting requests over the limit with 429.
pub async fn enforce(
    State(limiter): State<SharedRateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_ip = extract_client_ip(request.headers(), peer);
    if limiter.check_ip(client_ip.as_deref()) == RateLimitDecision::Limited {
        warn!(client_ip = client_ip.as_deref().unwrap_or("unknown"), "rate limited");
        return AuthError::RateLimited.into_response();
    }
    next.run(request).await
}
