//! Compiles a merged Configuration into a RoutingTable.
//!
//! Pure with respect to the snapshot: the only shared state it touches are
//! the health and breaker arenas, which it checks out by stable identity so
//! learned state survives rebuilds. Any inconsistency rejects the whole
//! snapshot — the previously published table is never disturbed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;

use crate::config::dynamic::Configuration;
use crate::health::registry::HealthRegistry;
use crate::health::state::HealthThresholds;
use crate::load_balancer::server::{canonicalize, PoolServer, ServerUrlError};
use crate::load_balancer::{Balancer, ServerPool};
use crate::resilience::circuit_breaker::BreakerRegistry;
use crate::routing::matcher::{Matcher, MatcherError};
use crate::routing::table::{Route, RoutingTable};

/// Why a snapshot was rejected. The whole configuration is discarded; no
/// partial apply.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("frontend {frontend:?} references unknown backend {backend:?}")]
    DanglingBackend { frontend: String, backend: String },

    #[error("frontend {frontend:?} references unknown entry point {entry_point:?}")]
    UnknownEntryPoint {
        frontend: String,
        entry_point: String,
    },

    #[error("frontend {frontend:?} rule is invalid: {source}")]
    InvalidRule {
        frontend: String,
        #[source]
        source: MatcherError,
    },

    #[error("backend {backend:?} server {url:?} is invalid: {source}")]
    InvalidServer {
        backend: String,
        url: String,
        #[source]
        source: ServerUrlError,
    },

    #[error("backend {backend:?} health-check path must start with '/'")]
    InvalidHealthCheck { backend: String },
}

/// Everything the builder needs besides the snapshot itself.
pub struct BuildContext<'a> {
    /// Entry point names declared in the static configuration.
    pub entry_points: &'a HashSet<String>,
    /// Health overlay arena, keyed by server URL.
    pub health_registry: &'a HealthRegistry,
    /// Circuit-breaker arena, keyed by backend name.
    pub breaker_registry: &'a BreakerRegistry,
    /// Shared health thresholds.
    pub thresholds: HealthThresholds,
}

/// Compile a snapshot into a servable table.
pub fn build(
    config: &Configuration,
    ctx: &BuildContext<'_>,
) -> Result<RoutingTable, ConfigurationError> {
    let mut pools: HashMap<String, Arc<ServerPool>> = HashMap::new();

    for (name, backend) in &config.backends {
        let mut servers = Vec::with_capacity(backend.servers.len());
        for server_config in &backend.servers {
            let (key, _) = canonicalize(&server_config.url).map_err(|source| {
                ConfigurationError::InvalidServer {
                    backend: name.clone(),
                    url: server_config.url.clone(),
                    source,
                }
            })?;
            let slot = ctx.health_registry.checkout(&key);
            let server = PoolServer::new(&server_config.url, server_config.weight, slot)
                .map_err(|source| ConfigurationError::InvalidServer {
                    backend: name.clone(),
                    url: server_config.url.clone(),
                    source,
                })?;
            servers.push(Arc::new(server));
        }

        if let Some(spec) = &backend.health_check {
            if !spec.path.starts_with('/') {
                return Err(ConfigurationError::InvalidHealthCheck {
                    backend: name.clone(),
                });
            }
        }

        let breaker = backend
            .circuit_breaker
            .as_ref()
            .map(|spec| ctx.breaker_registry.checkout(name, spec));

        let pool = ServerPool::new(
            name.clone(),
            servers,
            Balancer::new(backend.load_balancer),
            breaker,
            backend.health_check.clone(),
            ctx.thresholds,
        );
        pools.insert(name.clone(), Arc::new(pool));
    }

    let mut routes: HashMap<String, Vec<Arc<Route>>> = HashMap::new();

    for (name, frontend) in &config.frontends {
        let pool = pools
            .get(&frontend.backend)
            .cloned()
            .ok_or_else(|| ConfigurationError::DanglingBackend {
                frontend: name.clone(),
                backend: frontend.backend.clone(),
            })?;

        let matcher =
            Matcher::compile(&frontend.rule).map_err(|source| ConfigurationError::InvalidRule {
                frontend: name.clone(),
                source,
            })?;

        let bindings: Vec<&String> = if frontend.entry_points.is_empty() {
            // Unbound frontends listen everywhere.
            ctx.entry_points.iter().collect()
        } else {
            for entry_point in &frontend.entry_points {
                if !ctx.entry_points.contains(entry_point) {
                    return Err(ConfigurationError::UnknownEntryPoint {
                        frontend: name.clone(),
                        entry_point: entry_point.clone(),
                    });
                }
            }
            frontend.entry_points.iter().collect()
        };

        let route = Arc::new(Route {
            name: name.clone(),
            priority: frontend.priority,
            specificity: matcher.specificity(),
            matcher,
            pool,
        });
        for entry_point in bindings {
            routes.entry(entry_point.clone()).or_default().push(route.clone());
        }
    }

    for list in routes.values_mut() {
        list.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.specificity.cmp(&a.specificity))
                .then(a.name.cmp(&b.name))
        });
    }

    Ok(RoutingTable::new(routes, pools))
}
