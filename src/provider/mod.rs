//! Discovery provider contract.
//!
//! # Data Flow
//! ```text
//! external discovery backend (catalog, container runtime, file on disk)
//!     → provider task (translate native data model into a Configuration)
//!     → ConfigurationMessage over one bounded channel
//!     → aggregator (merge + debounce)
//! ```
//!
//! # Design Decisions
//! - Providers share nothing with each other or the aggregator beyond the
//!   message stream; each runs as its own task
//! - A provider emits an initial message once it has a consistent view, so
//!   the aggregator is never left waiting after startup
//! - On backend loss a provider retries with jittered backoff and keeps its
//!   last-known-good view; it never emits an empty snapshot to signal
//!   transient trouble

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::dynamic::Configuration;

pub mod file;

pub use file::FileProvider;

/// One provider's updated view of the world.
#[derive(Debug, Clone)]
pub struct ConfigurationMessage {
    /// Name the aggregator namespaces this provider's entities under.
    pub provider_name: String,
    /// The provider's complete current view.
    pub configuration: Configuration,
}

/// A source of configuration messages.
pub trait Provider: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Start the provider's task. It pushes messages into `tx` until the
    /// shutdown signal fires or the aggregator goes away.
    fn spawn(
        self: Arc<Self>,
        tx: mpsc::Sender<ConfigurationMessage>,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()>;
}

/// Provider for operator-declared routes: emits one fixed snapshot at
/// startup and nothing more.
#[derive(Debug)]
pub struct StaticProvider {
    name: String,
    configuration: Configuration,
}

impl StaticProvider {
    pub fn new(name: impl Into<String>, configuration: Configuration) -> Self {
        Self {
            name: name.into(),
            configuration,
        }
    }
}

impl Provider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn spawn(
        self: Arc<Self>,
        tx: mpsc::Sender<ConfigurationMessage>,
        _shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let message = ConfigurationMessage {
                provider_name: self.name.clone(),
                configuration: self.configuration.clone(),
            };
            if tx.send(message).await.is_err() {
                tracing::warn!(provider = %self.name, "Aggregator gone before initial message");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;

    #[tokio::test]
    async fn test_static_provider_emits_exactly_once() {
        let provider = Arc::new(StaticProvider::new("static", Configuration::default()));
        let (tx, mut rx) = mpsc::channel(4);
        let shutdown = Shutdown::new();

        let handle = provider.spawn(tx, shutdown.subscribe());

        let message = rx.recv().await.unwrap();
        assert_eq!(message.provider_name, "static");
        handle.await.unwrap();
        // Sender dropped with the task; no further messages.
        assert!(rx.recv().await.is_none());
    }
}
