//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging via `tracing`; every subsystem logs events, the
//!   request ID threads through the request path
//! - Metrics are cheap atomic updates behind the `metrics` facade, exposed
//!   on a separate Prometheus listener
//! - Neither is ever on a failure path: a broken exporter only logs

pub mod logging;
pub mod metrics;
