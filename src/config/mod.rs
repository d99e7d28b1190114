//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! Static (bootstrap, loaded once):
//!     config file (TOML)
//!         → loader.rs (parse & deserialize)
//!         → validation.rs (semantic checks)
//!         → ProxyConfig (validated, immutable for the process lifetime)
//!
//! Dynamic (reloaded continuously):
//!     provider message
//!         → dynamic.rs Configuration snapshot
//!         → aggregator (merge + debounce)
//!         → routing builder (compile or reject)
//! ```
//!
//! # Design Decisions
//! - Static and dynamic models are separate types: the bootstrap file can
//!   never declare a route, a provider can never rebind a listener
//! - Every static section has defaults so a minimal file works
//! - Dynamic snapshots are plain data, no behavior attached

pub mod dynamic;
pub mod loader;
pub mod schema;
pub mod validation;

pub use dynamic::Configuration;
pub use schema::ProxyConfig;
