//! Proxy header adjustments and synthesized responses.
//!
//! # Design Decisions
//! - Hop-by-hop headers are stripped in both directions; the original Host
//!   header is forwarded unchanged (backends routing on it keep working)
//! - `x-forwarded-*` headers are appended, never overwritten blindly:
//!   an existing `x-forwarded-for` chain is extended
//! - Synthesized errors carry a short plain-text body and are the only
//!   responses the proxy originates itself

use std::net::IpAddr;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Headers that are connection-scoped and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_lowercase())
        .collect();
    for name in named {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Add the standard forwarding headers for a request about to go upstream.
pub fn apply_forwarding_headers(
    headers: &mut HeaderMap,
    client_ip: IpAddr,
    original_host: Option<&str>,
) {
    let client = client_ip.to_string();
    let forwarded_for = match headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        Some(chain) => format!("{chain}, {client}"),
        None => client,
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert("x-forwarded-for", value);
    }

    headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));

    if let Some(host) = original_host {
        if let Ok(value) = HeaderValue::from_str(host) {
            headers.insert("x-forwarded-host", value);
        }
    }
}

/// No frontend matched: a routing miss, not an internal error.
pub fn routing_miss() -> Response {
    (StatusCode::NOT_FOUND, "no matching route").into_response()
}

/// The matched pool has no routable server.
pub fn no_available_server() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "no available server").into_response()
}

/// The pool's circuit breaker rejected the request before any dial.
pub fn circuit_open() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "circuit open").into_response()
}

/// Every allowed attempt failed at the transport level.
pub fn upstream_failed() -> Response {
    (StatusCode::BAD_GATEWAY, "upstream request failed").into_response()
}
