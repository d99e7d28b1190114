//! Static bootstrap configuration schema.
//!
//! This is the operator-written file loaded once at startup: entry points,
//! provider bootstrap, debounce and forwarding settings, health defaults and
//! observability. Routes and backends are NOT declared here — they arrive
//! dynamically from providers. All types derive Serde traits for
//! deserialization from the TOML config file.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::dynamic::Configuration;

/// Root static configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listening entry points, keyed by name.
    pub entry_points: BTreeMap<String, EntryPointConfig>,

    /// Discovery provider bootstrap.
    pub providers: ProvidersConfig,

    /// Configuration aggregation settings.
    pub aggregator: AggregatorConfig,

    /// Request forwarding and retry settings.
    pub forwarding: ForwardingConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Health-state defaults shared by active probes and passive signals.
    pub health: HealthDefaults,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        let mut entry_points = BTreeMap::new();
        entry_points.insert("http".to_string(), EntryPointConfig::default());
        Self {
            entry_points,
            providers: ProvidersConfig::default(),
            aggregator: AggregatorConfig::default(),
            forwarding: ForwardingConfig::default(),
            timeouts: TimeoutConfig::default(),
            health: HealthDefaults::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// One listening entry point.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EntryPointConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for EntryPointConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Which providers to start and how.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// File provider: watches a dynamic-configuration fragment on disk.
    pub file: Option<FileProviderConfig>,

    /// Static provider: a fixed fragment declared inline in this file.
    #[serde(rename = "static")]
    pub static_configuration: Option<Configuration>,
}

/// File provider bootstrap.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileProviderConfig {
    /// Path to the watched TOML or JSON fragment.
    pub path: String,

    /// Provider name used for namespacing; defaults to "file".
    #[serde(default = "default_file_provider_name")]
    pub name: String,
}

fn default_file_provider_name() -> String {
    "file".to_string()
}

/// Aggregation and debounce settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Quiet period after the last provider message before a rebuild.
    pub debounce_ms: u64,

    /// Capacity of the provider message channel.
    pub channel_capacity: usize,
}

impl AggregatorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            channel_capacity: 64,
        }
    }
}

/// Forwarding and retry settings for the request path.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Total attempts per request (first try included).
    pub max_attempts: u32,

    /// Largest body, in bytes, buffered to keep a request retryable.
    pub retry_buffer_limit: usize,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_buffer_limit: 1024 * 1024,
        }
    }
}

/// Timeout configuration for forwarded traffic.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Whole-request timeout in seconds, enforced at the entry point.
    pub request_secs: u64,

    /// Per-attempt deadline in seconds; an attempt past it counts as a
    /// transient failure and may be retried on another server.
    pub attempt_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            attempt_secs: 10,
        }
    }
}

/// Shared health-state machine settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthDefaults {
    /// Consecutive failures before a server is marked down.
    pub unhealthy_threshold: u32,

    /// Consecutive successes before a down server rejoins.
    pub healthy_threshold: u32,

    /// Successful builds a server may be absent from before its learned
    /// health state is dropped.
    pub forget_after_builds: u32,
}

impl Default for HealthDefaults {
    fn default() -> Self {
        Self {
            unhealthy_threshold: 3,
            healthy_threshold: 2,
            forget_after_builds: 3,
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_declare_http_entry_point() {
        let config = ProxyConfig::default();
        assert!(config.entry_points.contains_key("http"));
        assert_eq!(config.aggregator.debounce_ms, 500);
        assert_eq!(config.forwarding.max_attempts, 3);
    }

    #[test]
    fn test_minimal_file_parses_with_defaults() {
        let toml = r#"
            [entry_points.web]
            bind_address = "127.0.0.1:9000"

            [providers.file]
            path = "dynamic.toml"
        "#;
        let config: ProxyConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.entry_points["web"].bind_address, "127.0.0.1:9000");
        let file = config.providers.file.unwrap();
        assert_eq!(file.name, "file");
        assert_eq!(config.health.unhealthy_threshold, 3);
    }

    #[test]
    fn test_inline_static_provider_fragment() {
        let toml = r#"
            [providers.static.frontends.site]
            backend = "site"
            rule = { kind = "path_prefix", prefix = "/" }

            [providers.static.backends.site]
            servers = [{ url = "http://127.0.0.1:3000" }]
        "#;
        let config: ProxyConfig = toml::from_str(toml).unwrap();
        let fragment = config.providers.static_configuration.unwrap();
        assert!(fragment.frontends.contains_key("site"));
    }
}
