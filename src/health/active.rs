//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe each server that has a health check configured
//! - Feed probe results into the shared per-server state machine
//!
//! Reads the *current* routing table on every tick, so a reload is picked
//! up without restarting the monitor. Probes issued in one tick are awaited
//! before the next, which also guarantees no two probes for the same server
//! overlap.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::dynamic::HealthCheckSpec;
use crate::health::state::HealthThresholds;
use crate::load_balancer::server::PoolServer;
use crate::observability::metrics;
use crate::routing::TableSwitch;

/// Granularity of the scheduling tick; per-server intervals come from each
/// backend's health-check spec.
const TICK: Duration = Duration::from_millis(100);

pub struct HealthMonitor {
    switch: Arc<TableSwitch>,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(switch: Arc<TableSwitch>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { switch, client }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Health monitor starting");
        let mut due: HashMap<String, Instant> = HashMap::new();
        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_due(&mut due).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn probe_due(&self, due: &mut HashMap<String, Instant>) {
        let table = self.switch.current();
        let now = Instant::now();
        let mut probes = Vec::new();

        for pool in table.pools().values() {
            let Some(spec) = pool.health_check() else {
                continue;
            };
            for server in pool.servers() {
                if due.get(server.key()).is_some_and(|at| *at > now) {
                    continue;
                }
                due.insert(
                    server.key().to_string(),
                    now + Duration::from_millis(spec.interval_ms),
                );
                probes.push(probe_server(
                    self.client.clone(),
                    server.clone(),
                    spec.clone(),
                    pool.thresholds(),
                ));
            }
        }

        futures_util::future::join_all(probes).await;

        // Forget schedules for servers the current table no longer has.
        let live = table.server_urls();
        due.retain(|url, _| live.contains(url));
    }
}

async fn probe_server(
    client: Client<HttpConnector, Body>,
    server: Arc<PoolServer>,
    spec: HealthCheckSpec,
    thresholds: HealthThresholds,
) {
    let uri = format!("http://{}{}", server.authority(), spec.path);
    let request = match Request::builder()
        .method("GET")
        .uri(uri)
        .header("user-agent", "switchyard-health-check")
        .body(Body::empty())
    {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(server = %server.key(), error = %e, "Failed to build probe request");
            return;
        }
    };

    let timeout = Duration::from_millis(spec.timeout_ms);
    let healthy = match tokio::time::timeout(timeout, client.request(request)).await {
        Ok(Ok(response)) => {
            let ok = response.status().is_success();
            if !ok {
                tracing::warn!(
                    server = %server.key(),
                    status = %response.status(),
                    "Probe failed: non-success status"
                );
            }
            ok
        }
        Ok(Err(e)) => {
            tracing::warn!(server = %server.key(), error = %e, "Probe failed: connection error");
            false
        }
        Err(_) => {
            tracing::warn!(server = %server.key(), "Probe failed: timeout");
            false
        }
    };

    if healthy {
        if server.health().record_success(thresholds) {
            tracing::info!(server = %server.key(), "Server back up");
            metrics::record_backend_health(server.key(), true);
        }
    } else if server.health().record_failure(thresholds) {
        tracing::warn!(server = %server.key(), "Server marked down");
        metrics::record_backend_health(server.key(), false);
    }
}
