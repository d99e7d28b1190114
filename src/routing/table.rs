//! The compiled routing table.
//!
//! # Design Decisions
//! - Immutable after construction: the request path never takes a lock
//! - Per entry point, routes are pre-sorted (priority, then specificity,
//!   then name) so matching is a deterministic first-hit scan
//! - Rebuilt wholesale on every configuration change, never patched

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::http::Request;

use crate::load_balancer::ServerPool;
use crate::routing::matcher::Matcher;

/// One frontend compiled against its backend pool.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub priority: i32,
    pub specificity: usize,
    pub matcher: Matcher,
    pub pool: Arc<ServerPool>,
}

/// The immutable artifact the hot path reads: for each entry point, an
/// ordered list of routes bound to ready-to-use backend pools.
#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: HashMap<String, Vec<Arc<Route>>>,
    pools: HashMap<String, Arc<ServerPool>>,
}

impl RoutingTable {
    /// The table served before any discovery data arrives: matches nothing,
    /// so every request is a routing miss.
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(
        routes: HashMap<String, Vec<Arc<Route>>>,
        pools: HashMap<String, Arc<ServerPool>>,
    ) -> Self {
        Self { routes, pools }
    }

    /// First matching route for this entry point, in priority order.
    pub fn match_request<B>(&self, entry_point: &str, req: &Request<B>) -> Option<&Arc<Route>> {
        self.routes
            .get(entry_point)?
            .iter()
            .find(|route| route.matcher.matches(req))
    }

    /// All compiled pools, for the health prober.
    pub fn pools(&self) -> &HashMap<String, Arc<ServerPool>> {
        &self.pools
    }

    /// Identities of every server in the table, for overlay sweeping.
    pub fn server_urls(&self) -> HashSet<String> {
        self.pools
            .values()
            .flat_map(|pool| pool.servers().iter().map(|s| s.key().to_string()))
            .collect()
    }

    /// Names of every backend in the table, for breaker sweeping.
    pub fn backend_names(&self) -> HashSet<String> {
        self.pools.keys().cloned().collect()
    }

    pub fn route_count(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
