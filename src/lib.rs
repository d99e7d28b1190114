//! switchyard — a reverse proxy whose routes come from service discovery.
//!
//! # Architecture Overview
//!
//! ```text
//!  providers (file, static, …)          request path
//!  ────────────────────────────         ─────────────────────────────
//!  provider ─┐                          entry point (axum)
//!  provider ─┼─▶ aggregator                 │ match against live table
//!  provider ─┘   (merge + debounce)         ▼
//!                    │                  circuit breaker ─▶ 503 (open)
//!                    ▼                      │
//!               router builder          load balancer ─▶ 503 (no server)
//!           (compile or reject)             │
//!                    │                      ▼
//!                    ▼                  forward + bounded retries
//!               table switch ──────────▶ (reads current table,
//!               (atomic publish)          reports outcomes back)
//! ```
//!
//! Configuration flows left to right as immutable snapshots; the only
//! object shared between the build side and the request side is the
//! atomically swapped routing table. Health and circuit state live in
//! arenas keyed by stable identity, so rebuilding on every change never
//! discards what the proxy has learned.

// Dynamic configuration pipeline
pub mod aggregator;
pub mod config;
pub mod provider;
pub mod routing;

// Traffic management
pub mod health;
pub mod http;
pub mod load_balancer;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use aggregator::{Aggregator, AggregatorSettings};
pub use config::{Configuration, ProxyConfig};
pub use http::EntryPointServer;
pub use lifecycle::Shutdown;
pub use routing::TableSwitch;
