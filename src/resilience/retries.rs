//! Retry policy for forwarded requests.
//!
//! # Design Decisions
//! - Only transport-level failures (connect error, per-attempt timeout) are
//!   retried; a valid HTTP response — any status — is passed through
//! - Retries target a different server in the pool when one is available
//! - Non-idempotent requests get exactly one attempt
//! - Bodies are buffered for replay only when the declared length fits the
//!   configured limit; otherwise the request streams and is not retried

use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, Method};

/// Whether a method may be sent more than once.
pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE | Method::TRACE
    )
}

/// Whether a request body can be buffered for retry: idempotent method and
/// a body we know fits in `limit` bytes. GET/HEAD are assumed bodiless.
pub fn can_buffer(method: &Method, headers: &HeaderMap, limit: usize) -> bool {
    if !is_idempotent(method) {
        return false;
    }
    if matches!(*method, Method::GET | Method::HEAD) {
        return true;
    }
    match headers.get(CONTENT_LENGTH).and_then(|v| v.to_str().ok()) {
        Some(value) => value.parse::<usize>().map(|n| n <= limit).unwrap_or(false),
        None => false,
    }
}
