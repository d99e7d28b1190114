//! Configuration aggregation.
//!
//! # Data Flow
//! ```text
//! ConfigurationMessage (any provider, any time)
//!     → per-provider map (last message wins per provider)
//!     → debounce timer (start/refresh on every message)
//!     → on settle: merge all providers into one Configuration
//!     → router builder (synchronously, inside the publish step)
//!     → table switch on success; logged rejection on failure
//! ```
//!
//! # Design Decisions
//! - One consumer task serializes all merges; no two rebuilds race
//! - Entity names are namespaced `provider.name`; an already-qualified name
//!   is kept verbatim, which is also how one provider deliberately overrides
//!   another
//! - Providers merge in alphabetical order, so on a qualified-name collision
//!   the alphabetically later provider wins — a documented tie-break, not
//!   an error
//! - Exactly one publish per settled burst: flapping discovery backends cost
//!   at most one rebuild per debounce window

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use crate::config::dynamic::Configuration;
use crate::health::registry::HealthRegistry;
use crate::health::state::HealthThresholds;
use crate::provider::ConfigurationMessage;
use crate::resilience::circuit_breaker::BreakerRegistry;
use crate::routing::{build, BuildContext, TableSwitch};

/// Tunables lifted from the static configuration.
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    /// Quiet period after the last message before a rebuild.
    pub debounce: Duration,
    /// Builds a server/backend may be absent from before its overlay state
    /// is dropped.
    pub forget_after_builds: u32,
}

/// Single consumer of all provider messages; owns the merge-and-publish
/// step end to end.
pub struct Aggregator {
    switch: Arc<TableSwitch>,
    health_registry: Arc<HealthRegistry>,
    breaker_registry: Arc<BreakerRegistry>,
    entry_points: HashSet<String>,
    thresholds: HealthThresholds,
    settings: AggregatorSettings,
    providers: BTreeMap<String, Configuration>,
}

impl Aggregator {
    pub fn new(
        switch: Arc<TableSwitch>,
        health_registry: Arc<HealthRegistry>,
        breaker_registry: Arc<BreakerRegistry>,
        entry_points: HashSet<String>,
        thresholds: HealthThresholds,
        settings: AggregatorSettings,
    ) -> Self {
        Self {
            switch,
            health_registry,
            breaker_registry,
            entry_points,
            thresholds,
            settings,
            providers: BTreeMap::new(),
        }
    }

    /// Consume provider messages until the channel closes or shutdown fires.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<ConfigurationMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut deadline: Option<tokio::time::Instant> = None;

        loop {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(message) => {
                        tracing::debug!(
                            provider = %message.provider_name,
                            frontends = message.configuration.frontends.len(),
                            backends = message.configuration.backends.len(),
                            "Provider update received"
                        );
                        self.providers.insert(message.provider_name, message.configuration);
                        deadline = Some(tokio::time::Instant::now() + self.settings.debounce);
                    }
                    None => {
                        // All providers gone; flush anything still pending.
                        if deadline.is_some() {
                            self.rebuild();
                        }
                        tracing::debug!("Provider channel closed, aggregator exiting");
                        break;
                    }
                },
                _ = settle(deadline) => {
                    deadline = None;
                    self.rebuild();
                }
                _ = shutdown.recv() => break,
            }
        }
    }

    fn rebuild(&self) {
        let merged = merge(&self.providers);
        let ctx = BuildContext {
            entry_points: &self.entry_points,
            health_registry: &self.health_registry,
            breaker_registry: &self.breaker_registry,
            thresholds: self.thresholds,
        };
        match build(&merged, &ctx) {
            Ok(table) => {
                let live_servers = table.server_urls();
                let live_backends = table.backend_names();
                self.switch.publish(table);
                self.health_registry
                    .sweep(&live_servers, self.settings.forget_after_builds);
                self.breaker_registry
                    .sweep(&live_backends, self.settings.forget_after_builds);
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    providers = self.providers.len(),
                    "Rejected merged configuration, keeping previous routing table"
                );
            }
        }
    }
}

async fn settle(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

/// Merge every provider's snapshot into one Configuration.
///
/// Deterministic: providers merge in alphabetical order; names are
/// qualified as `provider.entity` unless they already contain a dot; on a
/// collision of qualified names the later provider wins. Frontend backend
/// references are qualified the same way so they stay provider-local
/// unless written as an explicit cross-provider reference.
pub fn merge(providers: &BTreeMap<String, Configuration>) -> Configuration {
    let mut merged = Configuration::default();

    for (provider, configuration) in providers {
        for (name, frontend) in &configuration.frontends {
            let mut frontend = frontend.clone();
            frontend.backend = qualified(provider, &frontend.backend);
            merged.frontends.insert(qualified(provider, name), frontend);
        }
        for (name, backend) in &configuration.backends {
            merged
                .backends
                .insert(qualified(provider, name), backend.clone());
        }
    }

    merged
}

fn qualified(provider: &str, name: &str) -> String {
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{provider}.{name}")
    }
}
