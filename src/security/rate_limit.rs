//! Per-client rate limiting.
//!
//! One token bucket per client IP (the port is dropped so every connection
//! from an address shares a bucket). Buckets start full, refill continuously
//! at `requests_per_second` up to `burst_size`, and are evicted by a
//! background sweep once idle for `idle_eviction_secs`.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::RateLimitConfig;
use crate::http::response::ApiError;
use crate::observability::metrics;

struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shared limiter state, owned by the rate-limit stage.
pub struct RateLimiter {
    buckets: Mutex<HashMap<IpAddr, TokenBucket>>,
    enabled: bool,
    rate: f64,
    burst: f64,
    idle_timeout: Duration,
    sweep_interval: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            enabled: config.enabled,
            rate: config.requests_per_second,
            burst: f64::from(config.burst_size),
            idle_timeout: Duration::from_secs(config.idle_eviction_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Take one token for `client`, creating its bucket on first sight.
    pub fn check(&self, client: IpAddr) -> bool {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: IpAddr, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::new(self.burst, now))
            .try_acquire(self.burst, self.rate, now)
    }

    /// Drop buckets not touched within the idle window. Returns the number removed.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_update) < self.idle_timeout);
        before - buckets.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Run [`evict_idle`](Self::evict_idle) every sweep interval until shutdown.
    pub fn spawn_sweeper(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.sweep_interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = self.evict_idle(Instant::now());
                        if evicted > 0 {
                            tracing::debug!(
                                evicted,
                                remaining = self.tracked_clients(),
                                "Evicted idle rate limit buckets"
                            );
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Rate limit sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

/// Middleware enforcing the per-client limit. Pass-through when disabled.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if !limiter.is_enabled() {
        return next.run(request).await;
    }

    let client = client_ip(&request);
    if limiter.check(client) {
        next.run(request).await
    } else {
        tracing::warn!(client = %client, "Rate limit exceeded");
        metrics::record_rate_limited();
        ApiError::RateLimitExceeded.into_response()
    }
}

fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
