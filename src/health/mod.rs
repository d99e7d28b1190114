//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active probes (active.rs):
//!     periodic GET per configured server
//!     → state.rs (shared counters)
//!
//! Passive signals (passive.rs + request path):
//!     forwarded request outcome observed
//!     → state.rs (same counters, same thresholds)
//!
//! Overlay lifetime (registry.rs):
//!     keyed by server URL, survives rebuilds,
//!     evicted after N builds without the server
//! ```
//!
//! # Design Decisions
//! - Active and passive signals are complementary and share one state
//!   machine per server
//! - Transitions require consecutive streaks (hysteresis against flapping)
//! - State is per server, not per pool, to avoid false contention

pub mod active;
pub mod passive;
pub mod registry;
pub mod state;

pub use active::HealthMonitor;
pub use registry::HealthRegistry;
pub use state::{HealthSlot, HealthState, HealthThresholds};
