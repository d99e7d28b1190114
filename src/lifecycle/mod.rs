//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     load static config → init observability → start providers,
//!     aggregator, health monitor → bind entry points last
//!
//! Shutdown (shutdown.rs + signals.rs):
//!     SIGTERM/SIGINT → broadcast → tasks drain and exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
