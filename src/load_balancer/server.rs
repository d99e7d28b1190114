//! A single forwarding target inside a backend pool.

use std::str::FromStr;
use std::sync::Arc;

use axum::http::uri::Authority;
use thiserror::Error;
use url::Url;

use crate::health::state::HealthSlot;

/// Error turning a configured server URL into a usable target.
#[derive(Debug, Error)]
pub enum ServerUrlError {
    #[error("unparseable url: {0}")]
    Parse(#[from] url::ParseError),

    #[error("unsupported scheme {0:?}, only http is forwarded")]
    UnsupportedScheme(String),

    #[error("url has no host")]
    MissingHost,

    #[error("invalid authority {0:?}")]
    InvalidAuthority(String),
}

/// A forwarding target with its pre-parsed authority and health overlay.
///
/// The canonical URL string doubles as the server's stable identity: health
/// and circuit state are keyed by it, so a reload that re-declares the same
/// URL keeps the learned state.
#[derive(Debug)]
pub struct PoolServer {
    key: String,
    authority: Authority,
    weight: u32,
    health: Arc<HealthSlot>,
}

impl PoolServer {
    /// Parse a configured URL and attach the given health slot.
    pub fn new(url: &str, weight: u32, health: Arc<HealthSlot>) -> Result<Self, ServerUrlError> {
        let (key, authority) = canonicalize(url)?;
        Ok(Self {
            key,
            authority,
            weight,
            health,
        })
    }

    /// Canonical identity, e.g. `http://10.0.0.3:8080`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Pre-parsed `host:port` for URI rewriting on the hot path.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn health(&self) -> &Arc<HealthSlot> {
        &self.health
    }

    pub fn is_up(&self) -> bool {
        self.health.is_up()
    }
}

/// Canonical identity and authority for a configured server URL.
pub fn canonicalize(raw: &str) -> Result<(String, Authority), ServerUrlError> {
    let url = Url::parse(raw)?;
    if url.scheme() != "http" {
        return Err(ServerUrlError::UnsupportedScheme(url.scheme().to_string()));
    }
    let host = url.host_str().ok_or(ServerUrlError::MissingHost)?;
    let port = url.port().unwrap_or(80);

    let authority_str = format!("{host}:{port}");
    let authority = Authority::from_str(&authority_str)
        .map_err(|_| ServerUrlError::InvalidAuthority(authority_str.clone()))?;
    Ok((format!("http://{authority_str}"), authority))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(url: &str) -> PoolServer {
        PoolServer::new(url, 1, Arc::new(HealthSlot::new())).unwrap()
    }

    #[test]
    fn test_canonical_identity_fills_default_port() {
        assert_eq!(server("http://10.0.0.1").key(), "http://10.0.0.1:80");
        assert_eq!(server("http://10.0.0.1:3000").key(), "http://10.0.0.1:3000");
    }

    #[test]
    fn test_identity_ignores_trailing_slash() {
        assert_eq!(server("http://app.internal/").key(), server("http://app.internal").key());
    }

    #[test]
    fn test_https_is_rejected() {
        let err = PoolServer::new("https://secure:443", 1, Arc::new(HealthSlot::new()));
        assert!(matches!(err, Err(ServerUrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(PoolServer::new("not a url", 1, Arc::new(HealthSlot::new())).is_err());
    }
}
