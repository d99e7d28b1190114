//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, one server per entry point)
//!     → request.rs (correlation ID as early as possible)
//!     → live RoutingTable snapshot (match, admit, select, forward)
//!     → response.rs (header adjustments, synthesized errors)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use server::{upstream_client, EntryPointServer, ProxyState};
