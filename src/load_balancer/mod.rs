//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → backend pool identified
//!     → pool.rs (circuit-breaker admission, selection, outcome reporting)
//!     → selection strategy:
//!         - round_robin.rs (rotate the declared order, skip down servers)
//!         - round_robin.rs HealthAware (rotate the up subset)
//!         - weighted.rs (weight-proportional random pick)
//!     → server.rs (target with pre-parsed authority + health handle)
//! ```
//!
//! # Design Decisions
//! - The strategy set is closed and known at compile time: an enum, not a
//!   trait object
//! - Selection only ever returns servers that are not confirmed Down
//! - Retried requests pass the URLs they already tried as exclusions;
//!   selection prefers a different server

use std::sync::Arc;

use thiserror::Error;

use crate::config::dynamic::BalancerKind;
use crate::load_balancer::server::PoolServer;

pub mod pool;
pub mod round_robin;
pub mod server;
pub mod weighted;

pub use pool::{RequestOutcome, ServerPool};

use round_robin::{HealthAware, RoundRobin};
use weighted::Weighted;

/// Selection failed because the pool has no routable server.
#[derive(Debug, Error)]
pub enum SelectError {
    #[error("no available server in backend {backend:?}")]
    NoAvailableServer { backend: String },
}

/// The pool's selection strategy.
#[derive(Debug)]
pub enum Balancer {
    RoundRobin(RoundRobin),
    Weighted(Weighted),
    HealthAware(HealthAware),
}

impl Balancer {
    pub fn new(kind: BalancerKind) -> Self {
        match kind {
            BalancerKind::RoundRobin => Balancer::RoundRobin(RoundRobin::new()),
            BalancerKind::Weighted => Balancer::Weighted(Weighted::new()),
            BalancerKind::HealthAware => Balancer::HealthAware(HealthAware::new()),
        }
    }

    pub fn pick(&self, servers: &[Arc<PoolServer>], excluded: &[String]) -> Option<Arc<PoolServer>> {
        match self {
            Balancer::RoundRobin(rr) => rr.pick(servers, excluded),
            Balancer::Weighted(w) => w.pick(servers, excluded),
            Balancer::HealthAware(ha) => ha.pick(servers, excluded),
        }
    }
}

/// Shared eligibility filter: routable and not already tried.
pub(crate) fn eligible(server: &Arc<PoolServer>, excluded: &[String]) -> bool {
    server.is_up() && !excluded.iter().any(|url| url == server.key())
}
