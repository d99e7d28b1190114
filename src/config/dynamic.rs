//! Dynamic configuration model.
//!
//! This is the tree each discovery provider emits: named frontends (routing
//! rules) and named backends (server pools). Snapshots are immutable once
//! published; downstream consumers always see a whole snapshot, never a
//! partial edit. All types derive Serde traits so providers can deserialize
//! them straight from their native sources (files, catalog payloads).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One provider's complete view of the routable world.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Configuration {
    /// Routing rules, keyed by frontend name.
    pub frontends: BTreeMap<String, Frontend>,

    /// Server pools, keyed by backend name.
    pub backends: BTreeMap<String, Backend>,
}

impl Configuration {
    /// True if the snapshot declares nothing at all.
    pub fn is_empty(&self) -> bool {
        self.frontends.is_empty() && self.backends.is_empty()
    }
}

/// A routing rule binding matched requests to one backend.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Frontend {
    /// Entry points this frontend listens on. Empty means every entry point.
    #[serde(default)]
    pub entry_points: Vec<String>,

    /// Name of the backend pool to forward to.
    pub backend: String,

    /// Higher priority wins on overlapping matches.
    #[serde(default)]
    pub priority: i32,

    /// Request-matching rule.
    pub rule: MatchRule,
}

/// Request-matching conditions.
///
/// A small closed set of variants; `All`/`Any` give AND/OR composition.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchRule {
    /// Exact Host header match (case-insensitive, port ignored).
    Host { host: String },
    /// Request path prefix match (case-sensitive).
    PathPrefix { prefix: String },
    /// Exact header match (name case-insensitive, value case-sensitive).
    Header { name: String, value: String },
    /// HTTP method match.
    Method { method: String },
    /// Every sub-rule must match.
    All { rules: Vec<MatchRule> },
    /// At least one sub-rule must match.
    Any { rules: Vec<MatchRule> },
}

/// A named pool of servers plus its traffic policy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Backend {
    /// Forwarding targets. An empty pool is valid and always answers 503.
    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    /// Load-balancing method for this pool.
    #[serde(default)]
    pub load_balancer: BalancerKind,

    /// Optional active health probing.
    #[serde(default)]
    pub health_check: Option<HealthCheckSpec>,

    /// Optional circuit breaking.
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerSpec>,
}

/// A forwarding target inside a backend pool.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server URL, e.g. `http://10.0.0.3:8080`. Also the server's stable
    /// identity for health and circuit state across reloads.
    pub url: String,

    /// Weight for weighted balancing. Zero removes the server from rotation.
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Load-balancing methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancerKind {
    /// Rotate through the pool in declaration order.
    #[default]
    RoundRobin,
    /// Pick proportionally to server weight.
    Weighted,
    /// Rotate over the currently-up subset only.
    HealthAware,
}

/// Active health-check settings for one backend.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckSpec {
    /// Path probed with a plain GET.
    pub path: String,

    /// Probe interval in milliseconds.
    pub interval_ms: u64,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for HealthCheckSpec {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
            interval_ms: 10_000,
            timeout_ms: 3_000,
        }
    }
}

/// Circuit-breaker settings for one backend.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerSpec {
    /// Error-rate threshold in [0, 1] that opens the circuit.
    pub max_error_rate: f64,

    /// Optional mean-latency threshold that also opens the circuit.
    pub max_mean_latency_ms: Option<u64>,

    /// Minimum samples in the window before the thresholds are evaluated.
    pub min_samples: usize,

    /// Rolling evaluation window in seconds.
    pub window_secs: u64,

    /// Time spent open before a recovery probe is allowed through.
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerSpec {
    fn default() -> Self {
        Self {
            max_error_rate: 0.5,
            max_mean_latency_ms: None,
            min_samples: 10,
            window_secs: 10,
            cooldown_secs: 10,
        }
    }
}
