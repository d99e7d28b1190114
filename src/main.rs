//! Process bootstrap: load the static configuration, start providers, the
//! aggregator, the health monitor and one server per entry point, then wait
//! for a shutdown signal.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use switchyard::aggregator::{Aggregator, AggregatorSettings};
use switchyard::config::loader::load_config;
use switchyard::config::ProxyConfig;
use switchyard::health::{HealthMonitor, HealthRegistry, HealthThresholds};
use switchyard::http::{upstream_client, EntryPointServer};
use switchyard::lifecycle::{signals, Shutdown};
use switchyard::observability::{logging, metrics};
use switchyard::provider::{FileProvider, Provider, StaticProvider};
use switchyard::resilience::circuit_breaker::BreakerRegistry;
use switchyard::routing::TableSwitch;

#[derive(Parser, Debug)]
#[command(name = "switchyard", about = "Reverse proxy with dynamic, discovery-driven routing")]
struct Args {
    /// Path to the static configuration file.
    #[arg(long, default_value = "switchyard.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = if args.config.exists() {
        load_config(&args.config)?
    } else {
        ProxyConfig::default()
    };

    logging::init(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "switchyard starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let health_registry = Arc::new(HealthRegistry::new());
    let breaker_registry = Arc::new(BreakerRegistry::new());
    let switch = Arc::new(TableSwitch::empty());
    let (tx, rx) = mpsc::channel(config.aggregator.channel_capacity);

    // Providers
    let mut providers: Vec<Arc<dyn Provider>> = Vec::new();
    if let Some(fragment) = &config.providers.static_configuration {
        providers.push(Arc::new(StaticProvider::new("static", fragment.clone())));
    }
    if let Some(file) = &config.providers.file {
        providers.push(Arc::new(FileProvider::new(file)));
    }
    if providers.is_empty() {
        tracing::warn!("No providers configured; every request will be answered 404");
    }

    let mut tasks = Vec::new();
    for provider in providers {
        tracing::info!(provider = provider.name(), "Starting provider");
        tasks.push(provider.spawn(tx.clone(), shutdown.subscribe()));
    }
    drop(tx);

    // Aggregator
    let entry_point_names: HashSet<String> = config.entry_points.keys().cloned().collect();
    let aggregator = Aggregator::new(
        switch.clone(),
        health_registry.clone(),
        breaker_registry.clone(),
        entry_point_names,
        HealthThresholds {
            unhealthy: config.health.unhealthy_threshold,
            healthy: config.health.healthy_threshold,
        },
        AggregatorSettings {
            debounce: config.aggregator.debounce(),
            forget_after_builds: config.health.forget_after_builds,
        },
    );
    tasks.push(tokio::spawn(aggregator.run(rx, shutdown.subscribe())));

    // Health monitor
    let monitor = HealthMonitor::new(switch.clone());
    tasks.push(tokio::spawn(monitor.run(shutdown.subscribe())));

    // Entry points
    let client = upstream_client(&config.timeouts);
    for (name, entry_point) in &config.entry_points {
        let listener = TcpListener::bind(&entry_point.bind_address).await?;
        let server = EntryPointServer::new(
            name.clone(),
            switch.clone(),
            client.clone(),
            config.forwarding.clone(),
            &config.timeouts,
        );
        let subscription = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = server.run(listener, subscription).await {
                tracing::error!(error = %e, "Entry point failed");
            }
        }));
    }

    signals::shutdown_on_signal(shutdown.clone()).await;

    tracing::info!("Shutting down");
    let _ = tokio::time::timeout(
        Duration::from_secs(5),
        futures_util::future::join_all(tasks),
    )
    .await;
    tracing::info!("Shutdown complete");
    Ok(())
}
