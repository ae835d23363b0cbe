//! Configuration validation.
//!
//! Semantic checks only; serde already handled the syntax. Every problem is
//! collected so an operator sees them all at once.

use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a loaded configuration, returning every error found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.shutdown_secs == 0 {
        errors.push(ValidationError::new("timeouts.shutdown_secs", "must be greater than 0"));
    }

    if config.database.pool_size == 0 {
        errors.push(ValidationError::new("database.pool_size", "must be greater than 0"));
    }
    if config.database.path.as_os_str().is_empty() {
        errors.push(ValidationError::new("database.path", "must not be empty"));
    }

    if config.uploads.max_bytes == 0 {
        errors.push(ValidationError::new("uploads.max_bytes", "must be greater than 0"));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
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

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.shutdown_secs = 0;
        config.database.pool_size = 0;
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "timeouts.shutdown_secs",
                "database.pool_size",
                "observability.log_level",
            ]
        );
    }

    #[test]
    fn metrics_address_only_checked_when_enabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
