//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the API.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Deployment environment (development, staging, production).
    pub environment: String,

    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Bearer tokens provisioned at startup.
    pub accounts: Vec<AccountConfig>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            rate_limit: RateLimitConfig::default(),
            observability: ObservabilityConfig::default(),
            accounts: Vec::new(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting. When false every request passes through.
    pub enabled: bool,

    /// Sustained requests per second per client address.
    pub requests_per_second: f64,

    /// Burst capacity.
    pub burst_size: u32,

    /// Buckets idle for this long are evicted.
    pub idle_eviction_secs: u64,

    /// How often the eviction sweep runs.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 2.0,
            burst_size: 4,
            idle_eviction_secs: 180,
            sweep_interval_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive, used when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "greenlight=info,tower_http=info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// A user and bearer token provisioned at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
    pub user_id: i64,

    pub token: String,

    #[serde(default = "default_activated")]
    pub activated: bool,

    /// Permission codes granted to the user, e.g. "movies:read".
    #[serde(default)]
    pub permissions: Vec<String>,

    /// Token lifetime in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

fn default_activated() -> bool {
    true
}

fn default_token_ttl() -> u64 {
    24 * 60 * 60
}
