//! Static configuration validation.
//!
//! Semantic checks on the bootstrap file (serde handles the syntactic ones).
//! Returns every violation, not just the first, so an operator can fix a
//! config in one pass.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic violation in the static configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("no entry points configured")]
    NoEntryPoints,

    #[error("entry point {name:?} has an unparseable bind address {address:?}")]
    InvalidBindAddress { name: String, address: String },

    #[error("aggregator debounce must be greater than zero")]
    ZeroDebounce,

    #[error("forwarding max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("health thresholds must be at least 1")]
    ZeroHealthThreshold,
}

/// Validate a loaded static configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.entry_points.is_empty() {
        errors.push(ValidationError::NoEntryPoints);
    }
    for (name, entry_point) in &config.entry_points {
        if entry_point.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidBindAddress {
                name: name.clone(),
                address: entry_point.bind_address.clone(),
            });
        }
    }

    if config.aggregator.debounce_ms == 0 {
        errors.push(ValidationError::ZeroDebounce);
    }
    if config.forwarding.max_attempts == 0 {
        errors.push(ValidationError::ZeroAttempts);
    }
    if config.health.unhealthy_threshold == 0 || config.health.healthy_threshold == 0 {
        errors.push(ValidationError::ZeroHealthThreshold);
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
    fn test_default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ProxyConfig::default();
        config.entry_points.get_mut("http").unwrap().bind_address = "not-an-addr".into();
        config.aggregator.debounce_ms = 0;
        config.forwarding.max_attempts = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::ZeroDebounce));
        assert!(errors.contains(&ValidationError::ZeroAttempts));
    }

    #[test]
    fn test_empty_entry_points_rejected() {
        let mut config = ProxyConfig::default();
        config.entry_points.clear();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::NoEntryPoints));
    }
}
