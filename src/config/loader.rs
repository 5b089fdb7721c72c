//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GuardConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GuardConfig, ConfigError> {
    let config: GuardConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GuardConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::StrategyKind;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.strategy, StrategyKind::CircuitBreaker);
        assert_eq!(config.queue.capacity, 10);
        assert_eq!(config.rate_limit.limit, 200);
    }

    #[test]
    fn test_partial_sections() {
        let config = parse_config(
            r#"
            strategy = "queue"

            [queue]
            capacity = 3
            workers = 2

            [circuit_breaker]
            threshold = 0.5
            failure_status = { from = 500, to = 504 }
            "#,
        )
        .unwrap();

        assert_eq!(config.strategy, StrategyKind::Queue);
        assert_eq!(config.queue.capacity, 3);
        assert_eq!(config.queue.workers, 2);
        assert_eq!(config.queue.wait_timeout_ms, 30_000);
        assert_eq!(config.circuit_breaker.threshold, 0.5);
        assert!(config.circuit_breaker.failure_status.contains(503));
        assert!(!config.circuit_breaker.failure_status.contains(504));
    }

    #[test]
    fn test_rejects_contradictory_config() {
        let err = parse_config("[circuit_breaker]\nthreshold = -0.2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("threshold"));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(matches!(parse_config("strategy = ["), Err(ConfigError::Parse(_))));
        assert!(matches!(parse_config("strategy = \"bogus\""), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
