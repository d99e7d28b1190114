//! Passive health signals from live traffic.
//!
//! # Design Decisions
//! - Only statuses that indicate an unreachable or overwhelmed server
//!   (502, 503, 504) count as failures
//! - Other 5xx are application bugs, not connectivity: the server stays up
//! - 4xx are client errors and never count against the server
//! - Transport errors and timeouts are failures (classified by the caller)

use axum::http::StatusCode;

/// Whether an upstream response status counts as a passive health failure.
pub fn status_is_failure(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Whether an upstream response status counts as an error sample for the
/// circuit breaker. Broader than the health signal: any 5xx indicates the
/// backend is in trouble.
pub fn status_is_breaker_error(status: StatusCode) -> bool {
    status.is_server_error()
}
