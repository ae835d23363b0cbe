//! Configuration loading from disk and the environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::{LogFormat, ServerConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

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

/// Load configuration from an optional TOML file, apply environment
/// overrides, and validate the result.
///
/// A `.env` file in the working directory is read first, without replacing
/// variables that are already set.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    dotenv::dotenv().ok();

    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => ServerConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML file without validating it.
pub fn parse_file(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Overlay environment variables on top of file/default values.
///
/// `PORT` keeps the host part of the configured bind address and swaps the
/// port only.
pub fn apply_env_overrides<F>(config: &mut ServerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("PORT") {
        let port: u16 = parse_env("PORT", &value)?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }

    if let Some(value) = lookup("SHUTDOWN_TIMEOUT") {
        config.timeouts.shutdown_secs = parse_env("SHUTDOWN_TIMEOUT", &value)?;
    }

    if let Some(value) = lookup("REQUEST_TIMEOUT") {
        config.timeouts.request_secs = parse_env("REQUEST_TIMEOUT", &value)?;
    }

    if let Some(value) = lookup("LOG_LEVEL") {
        config.observability.log_level = value.trim().to_ascii_lowercase();
    }

    if let Some(value) = lookup("LOG_FORMAT") {
        config.observability.log_format = parse_env::<LogFormat>("LOG_FORMAT", &value)?;
    }

    if let Some(value) = lookup("DATABASE_PATH") {
        config.database.path = PathBuf::from(value);
    }

    if let Some(value) = lookup("UPLOAD_DIR") {
        config.uploads.dir = PathBuf::from(value);
    }

    Ok(())
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "127.0.0.1:3000".into();

        apply_env_overrides(
            &mut config,
            env(&[("PORT", "9000"), ("SHUTDOWN_TIMEOUT", "5"), ("LOG_LEVEL", "DEBUG")]),
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.timeouts.shutdown_secs, 5);
        assert_eq!(config.timeouts.request_secs, 10);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn rejects_non_numeric_timeout() {
        let mut config = ServerConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("SHUTDOWN_TIMEOUT", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "SHUTDOWN_TIMEOUT", .. }));
    }

    #[test]
    fn parses_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[timeouts]\nshutdown_secs = 7\n\n[database]\npath = \"/var/lib/catalog.db\"\n\n[observability]\nlog_format = \"json\""
        )
        .unwrap();

        let config = parse_file(file.path()).unwrap();
        assert_eq!(config.timeouts.shutdown_secs, 7);
        assert_eq!(config.timeouts.request_secs, 10);
        assert_eq!(config.database.path, PathBuf::from("/var/lib/catalog.db"));
        assert_eq!(config.database.pool_size, 6);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
