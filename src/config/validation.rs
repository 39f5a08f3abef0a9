//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, rate > 0, burst >= 1)
//! - Check bootstrap accounts (token shape, duplicates, known permission codes)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ApiConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ApiConfig;
use crate::data::Permission;

const ENVIRONMENTS: [&str; 3] = ["development", "staging", "production"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("environment must be one of development, staging, production (got {0:?})")]
    UnknownEnvironment(String),

    #[error("listener.bind_address {0:?} is not a socket address")]
    InvalidBindAddress(String),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("rate_limit.requests_per_second must be a positive number")]
    InvalidRate,

    #[error("rate_limit.burst_size must be at least 1")]
    ZeroBurst,

    #[error("rate_limit.idle_eviction_secs and sweep_interval_secs must be greater than zero")]
    ZeroEvictionWindow,

    #[error("accounts[{index}].token must be a single non-empty word")]
    InvalidToken { index: usize },

    #[error("accounts[{index}].token is already used by another account")]
    DuplicateToken { index: usize },

    #[error("accounts[{index}] grants unknown permission {code:?}")]
    UnknownPermission { index: usize, code: String },
}

pub fn validate_config(config: &ApiConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !ENVIRONMENTS.contains(&config.environment.as_str()) {
        errors.push(ValidationError::UnknownEnvironment(config.environment.clone()));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    let limits = &config.rate_limit;
    if !(limits.requests_per_second.is_finite() && limits.requests_per_second > 0.0) {
        errors.push(ValidationError::InvalidRate);
    }
    if limits.burst_size == 0 {
        errors.push(ValidationError::ZeroBurst);
    }
    if limits.idle_eviction_secs == 0 || limits.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroEvictionWindow);
    }

    let mut tokens = HashSet::new();
    for (index, account) in config.accounts.iter().enumerate() {
        if account.token.is_empty() || account.token.contains(char::is_whitespace) {
            errors.push(ValidationError::InvalidToken { index });
        } else if !tokens.insert(account.token.as_str()) {
            errors.push(ValidationError::DuplicateToken { index });
        }

        for code in &account.permissions {
            if Permission::from_code(code).is_none() {
                errors.push(ValidationError::UnknownPermission {
                    index,
                    code: code.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::AccountConfig;

    fn account(token: &str, permissions: &[&str]) -> AccountConfig {
        AccountConfig {
            user_id: 1,
            token: token.to_string(),
            activated: true,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            token_ttl_secs: 60,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&ApiConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_problem() {
        let mut config = ApiConfig::default();
        config.environment = "qa".into();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.request_secs = 0;
        config.rate_limit.requests_per_second = 0.0;
        config.rate_limit.burst_size = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::UnknownEnvironment("qa".into())));
        assert!(errors.contains(&ValidationError::ZeroBurst));
    }

    #[test]
    fn accounts_are_checked() {
        let mut config = ApiConfig::default();
        config.accounts = vec![
            account("abc", &["movies:read"]),
            account("abc", &[]),
            account("two words", &[]),
            account("xyz", &["movies:admin"]),
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::DuplicateToken { index: 1 },
                ValidationError::InvalidToken { index: 2 },
                ValidationError::UnknownPermission { index: 3, code: "movies:admin".into() },
            ]
        );
    }

    #[test]
    fn metrics_address_only_checked_when_enabled() {
        let mut config = ApiConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidMetricsAddress("nope".into())])
        );
    }
}
