//! File provider: watches a dynamic-configuration fragment on disk.
//!
//! The closest thing to a discovery backend that fits in this crate: the
//! watched file plays the role of the external catalog. Emits an initial
//! snapshot at startup, then a fresh one on every change. A fragment that
//! fails to parse is logged and skipped — the aggregator keeps using the
//! last message this provider sent.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::dynamic::Configuration;
use crate::config::schema::FileProviderConfig;
use crate::provider::{ConfigurationMessage, Provider};
use crate::resilience::backoff::Backoff;

/// Error loading a dynamic fragment from disk.
#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("failed to read fragment: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML fragment: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse JSON fragment: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct FileProvider {
    name: String,
    path: PathBuf,
}

impl FileProvider {
    pub fn new(config: &FileProviderConfig) -> Self {
        Self {
            name: config.name.clone(),
            path: PathBuf::from(&config.path),
        }
    }

    /// Parse a fragment, dispatching on the file extension (`.json` is
    /// JSON, anything else TOML).
    pub fn load(path: &Path) -> Result<Configuration, FragmentError> {
        let content = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    async fn run(
        self: Arc<Self>,
        tx: mpsc::Sender<ConfigurationMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        // Initial snapshot, so the aggregator is not left waiting.
        match Self::load(&self.path) {
            Ok(configuration) => {
                if self.send(&tx, configuration).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::error!(
                    provider = %self.name,
                    path = ?self.path,
                    error = %e,
                    "Initial fragment unreadable, waiting for a valid change"
                );
            }
        }

        let (event_tx, mut event_rx) = mpsc::channel::<()>(8);
        let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(30));
        let _watcher = loop {
            match self.watch(event_tx.clone()) {
                Ok(watcher) => break watcher,
                Err(e) => {
                    let delay = backoff.delay();
                    tracing::warn!(
                        provider = %self.name,
                        error = %e,
                        retry_in = ?delay,
                        "Failed to start fragment watcher, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.recv() => return,
                    }
                }
            }
        };
        tracing::info!(provider = %self.name, path = ?self.path, "File provider watching");

        loop {
            tokio::select! {
                maybe = event_rx.recv() => {
                    if maybe.is_none() {
                        break;
                    }
                    match Self::load(&self.path) {
                        Ok(configuration) => {
                            tracing::info!(provider = %self.name, "Fragment changed, publishing");
                            if self.send(&tx, configuration).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::error!(
                                provider = %self.name,
                                error = %e,
                                "Fragment unreadable, keeping last-known-good"
                            );
                        }
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    }

    fn watch(&self, event_tx: mpsc::Sender<()>) -> Result<RecommendedWatcher, notify::Error> {
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        let _ = event_tx.blocking_send(());
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Fragment watch error"),
            },
            notify::Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }

    async fn send(
        &self,
        tx: &mpsc::Sender<ConfigurationMessage>,
        configuration: Configuration,
    ) -> Result<(), ()> {
        let message = ConfigurationMessage {
            provider_name: self.name.clone(),
            configuration,
        };
        tx.send(message).await.map_err(|_| {
            tracing::warn!(provider = %self.name, "Aggregator channel closed");
        })
    }
}

impl Provider for FileProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn spawn(
        self: Arc<Self>,
        tx: mpsc::Sender<ConfigurationMessage>,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(tx, shutdown))
    }
}
