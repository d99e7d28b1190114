//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Table build (on every settled configuration change):
//!     merged Configuration
//!         → builder.rs (validate refs, compile matchers, attach pools)
//!         → table.rs (sorted, immutable RoutingTable)
//!         → switch.rs (atomic publish)
//!
//! Request (hot path):
//!     switch.rs Current() snapshot
//!         → table.rs (first match per entry point, priority order)
//!         → matcher.rs (evaluate compiled conditions)
//! ```
//!
//! # Design Decisions
//! - A failed build leaves the live table untouched
//! - Matching is deterministic: priority, then specificity, then name
//! - First match wins; no match is an explicit miss, answered 404

pub mod builder;
pub mod matcher;
pub mod switch;
pub mod table;

pub use builder::{build, BuildContext, ConfigurationError};
pub use switch::TableSwitch;
pub use table::{Route, RoutingTable};
