//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → circuit_breaker.rs (admission before any backend contact)
//!     → on transport failure: retries.rs (different server, attempt cap)
//!     → every attempt's outcome recorded back into the breaker window
//!
//! Provider reconnects:
//!     → backoff.rs (jittered exponential delay, reset on success)
//! ```

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
