//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ApiConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ApiConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ApiConfig, ConfigError> {
    let config: ApiConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:4000");
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.burst_size, 4);
    }

    #[test]
    fn sections_and_accounts_parse() {
        let config = parse_config(
            r#"
            environment = "staging"

            [rate_limit]
            enabled = false
            requests_per_second = 10.5

            [[accounts]]
            user_id = 7
            token = "Y3QMGX3PJ3WLRL2YRTQGQ6KRHU"
            permissions = ["movies:read", "movies:write"]
            "#,
        )
        .unwrap();

        assert_eq!(config.environment, "staging");
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.rate_limit.requests_per_second, 10.5);
        assert_eq!(config.rate_limit.burst_size, 4);
        assert_eq!(config.accounts.len(), 1);
        assert!(config.accounts[0].activated);
        assert_eq!(config.accounts[0].token_ttl_secs, 86_400);
    }

    #[test]
    fn validation_errors_are_joined() {
        let err = parse_config("[rate_limit]\nburst_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("burst_size must be at least 1"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
