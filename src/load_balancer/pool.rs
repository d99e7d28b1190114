//! Backend pool: servers plus the traffic policy attached to them.

use std::sync::Arc;
use std::time::Duration;

use crate::config::dynamic::HealthCheckSpec;
use crate::health::state::HealthThresholds;
use crate::load_balancer::server::PoolServer;
use crate::load_balancer::{Balancer, SelectError};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{Admission, CircuitBreaker};

/// What one forwarded attempt looked like, as reported by the request path.
#[derive(Debug, Clone, Copy)]
pub struct RequestOutcome {
    /// Counts toward the server's health streaks.
    pub healthy: bool,
    /// Counts as a success sample for the circuit breaker.
    pub breaker_ok: bool,
    /// Attempt latency.
    pub latency: Duration,
}

/// One backend's compiled pool: the ready-to-use artifact the hot path
/// talks to. Immutable after the build; per-server health and the circuit
/// breaker are shared handles that outlive any single table.
#[derive(Debug)]
pub struct ServerPool {
    name: String,
    servers: Vec<Arc<PoolServer>>,
    balancer: Balancer,
    breaker: Option<Arc<CircuitBreaker>>,
    health_check: Option<HealthCheckSpec>,
    thresholds: HealthThresholds,
}

impl ServerPool {
    pub fn new(
        name: String,
        servers: Vec<Arc<PoolServer>>,
        balancer: Balancer,
        breaker: Option<Arc<CircuitBreaker>>,
        health_check: Option<HealthCheckSpec>,
        thresholds: HealthThresholds,
    ) -> Self {
        Self {
            name,
            servers,
            balancer,
            breaker,
            health_check,
            thresholds,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn servers(&self) -> &[Arc<PoolServer>] {
        &self.servers
    }

    pub fn health_check(&self) -> Option<&HealthCheckSpec> {
        self.health_check.as_ref()
    }

    pub fn thresholds(&self) -> HealthThresholds {
        self.thresholds
    }

    pub fn breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.breaker.as_ref()
    }

    /// Ask the circuit breaker whether traffic may flow. Pools without a
    /// breaker always admit.
    pub fn admit(&self) -> Admission {
        match &self.breaker {
            Some(breaker) => breaker.admit(),
            None => Admission::Allowed,
        }
    }

    /// Select an up server, preferring ones not in `excluded` (the URLs
    /// already tried for this request). When every up server has been tried
    /// the exclusion is lifted rather than failing the request early.
    pub fn select(&self, excluded: &[String]) -> Result<Arc<PoolServer>, SelectError> {
        if let Some(server) = self.balancer.pick(&self.servers, excluded) {
            return Ok(server);
        }
        if !excluded.is_empty() {
            if let Some(server) = self.balancer.pick(&self.servers, &[]) {
                return Ok(server);
            }
        }
        Err(SelectError::NoAvailableServer {
            backend: self.name.clone(),
        })
    }

    /// Feed one attempt's outcome into the server's health state machine and
    /// the pool's circuit breaker.
    pub fn report(&self, server: &PoolServer, admission: Admission, outcome: RequestOutcome) {
        if outcome.healthy {
            if server.health().record_success(self.thresholds) {
                tracing::info!(backend = %self.name, server = %server.key(), "Server back up");
                metrics::record_backend_health(server.key(), true);
            }
        } else if server.health().record_failure(self.thresholds) {
            tracing::warn!(backend = %self.name, server = %server.key(), "Server marked down");
            metrics::record_backend_health(server.key(), false);
        }

        if let Some(breaker) = &self.breaker {
            breaker.record(admission, outcome.breaker_ok, outcome.latency);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::state::HealthSlot;
    use crate::load_balancer::round_robin::RoundRobin;

    fn pool(urls: &[&str]) -> ServerPool {
        let servers = urls
            .iter()
            .map(|u| Arc::new(PoolServer::new(u, 1, Arc::new(HealthSlot::new())).unwrap()))
            .collect();
        ServerPool::new(
            "web".into(),
            servers,
            Balancer::RoundRobin(RoundRobin::new()),
            None,
            None,
            HealthThresholds {
                unhealthy: 1,
                healthy: 1,
            },
        )
    }

    #[test]
    fn test_empty_pool_never_selects() {
        let pool = pool(&[]);
        assert!(matches!(
            pool.select(&[]),
            Err(SelectError::NoAvailableServer { .. })
        ));
    }

    #[test]
    fn test_exclusion_lifted_when_exhausted() {
        let pool = pool(&["http://only:80"]);
        let tried = vec!["http://only:80".to_string()];
        // The sole server was already tried, but it is still up: reuse it
        // instead of failing the request.
        assert_eq!(pool.select(&tried).unwrap().key(), "http://only:80");
    }

    #[test]
    fn test_report_drives_health_state() {
        let pool = pool(&["http://a:80"]);
        let server = pool.servers()[0].clone();
        pool.report(
            &server,
            Admission::Allowed,
            RequestOutcome {
                healthy: false,
                breaker_ok: false,
                latency: Duration::from_millis(5),
            },
        );
        assert!(!server.is_up());
        assert!(matches!(
            pool.select(&[]),
            Err(SelectError::NoAvailableServer { .. })
        ));
    }
}
