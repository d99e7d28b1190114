//! Static configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for static configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate the static configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ProxyConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_round_trip() {
        let dir = std::env::temp_dir().join("switchyard-loader-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("proxy.toml");
        fs::write(
            &path,
            r#"
                [entry_points.http]
                bind_address = "127.0.0.1:18080"

                [aggregator]
                debounce_ms = 250
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.aggregator.debounce_ms, 250);
        assert_eq!(config.entry_points["http"].bind_address, "127.0.0.1:18080");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = std::env::temp_dir().join("switchyard-loader-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        fs::write(
            &path,
            r#"
                [aggregator]
                debounce_ms = 0
            "#,
        )
        .unwrap();

        match load_config(&path) {
            Err(ConfigError::Validation(errors)) => assert!(!errors.is_empty()),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }
}
