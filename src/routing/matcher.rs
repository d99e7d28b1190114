//! Route matching logic.
//!
//! # Responsibilities
//! - Match host header (exact, case-insensitive, port ignored)
//! - Match path prefix (case-sensitive)
//! - Match headers and methods
//! - Combine conditions with AND/OR semantics
//!
//! # Design Decisions
//! - A closed enum of matcher kinds, compiled once per table build; the hot
//!   path only walks pre-normalized values
//! - No regex, so matching stays O(rule size)
//! - Specificity (roughly: how much text a rule pins down) breaks priority
//!   ties deterministically

use axum::http::header::HeaderName;
use axum::http::{Method, Request};
use thiserror::Error;

use crate::config::dynamic::MatchRule;

/// Error compiling a configured rule.
#[derive(Debug, Error, PartialEq)]
pub enum MatcherError {
    #[error("host must not be empty")]
    EmptyHost,

    #[error("path prefix must start with '/'")]
    BadPrefix,

    #[error("invalid header name {0:?}")]
    BadHeaderName(String),

    #[error("invalid method {0:?}")]
    BadMethod(String),

    #[error("all/any must contain at least one rule")]
    EmptyCombinator,
}

/// A compiled, normalized matcher ready for the hot path.
#[derive(Debug)]
pub enum Matcher {
    Host(String),
    PathPrefix(String),
    Header { name: HeaderName, value: String },
    Method(Method),
    All(Vec<Matcher>),
    Any(Vec<Matcher>),
}

impl Matcher {
    /// Compile a configured rule, normalizing and validating its parts.
    pub fn compile(rule: &MatchRule) -> Result<Self, MatcherError> {
        match rule {
            MatchRule::Host { host } => {
                if host.is_empty() {
                    return Err(MatcherError::EmptyHost);
                }
                Ok(Matcher::Host(host.to_lowercase()))
            }
            MatchRule::PathPrefix { prefix } => {
                if !prefix.starts_with('/') {
                    return Err(MatcherError::BadPrefix);
                }
                Ok(Matcher::PathPrefix(prefix.clone()))
            }
            MatchRule::Header { name, value } => {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| MatcherError::BadHeaderName(name.clone()))?;
                Ok(Matcher::Header {
                    name,
                    value: value.clone(),
                })
            }
            MatchRule::Method { method } => {
                let method = Method::from_bytes(method.to_uppercase().as_bytes())
                    .map_err(|_| MatcherError::BadMethod(method.clone()))?;
                Ok(Matcher::Method(method))
            }
            MatchRule::All { rules } => Ok(Matcher::All(Self::compile_list(rules)?)),
            MatchRule::Any { rules } => Ok(Matcher::Any(Self::compile_list(rules)?)),
        }
    }

    fn compile_list(rules: &[MatchRule]) -> Result<Vec<Matcher>, MatcherError> {
        if rules.is_empty() {
            return Err(MatcherError::EmptyCombinator);
        }
        rules.iter().map(Self::compile).collect()
    }

    /// Returns true if the request matches this condition.
    pub fn matches<B>(&self, req: &Request<B>) -> bool {
        match self {
            Matcher::Host(expected) => request_host(req)
                .map(|h| h.to_lowercase() == *expected)
                .unwrap_or(false),
            Matcher::PathPrefix(prefix) => req.uri().path().starts_with(prefix),
            Matcher::Header { name, value } => req
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v == value)
                .unwrap_or(false),
            Matcher::Method(method) => req.method() == method,
            Matcher::All(matchers) => matchers.iter().all(|m| m.matches(req)),
            Matcher::Any(matchers) => matchers.iter().any(|m| m.matches(req)),
        }
    }

    /// How much request text this rule pins down; used as the priority
    /// tie-break so the more specific of two overlapping rules wins.
    pub fn specificity(&self) -> usize {
        match self {
            Matcher::Host(host) => host.len(),
            Matcher::PathPrefix(prefix) => prefix.len(),
            Matcher::Header { name, value } => name.as_str().len() + value.len(),
            Matcher::Method(_) => 1,
            Matcher::All(matchers) => matchers.iter().map(Matcher::specificity).sum(),
            Matcher::Any(matchers) => {
                matchers.iter().map(Matcher::specificity).min().unwrap_or(0)
            }
        }
    }
}

/// Host header without any port suffix, falling back to the URI authority
/// (HTTP/2 requests carry the host there). IPv6 literals keep their brackets.
fn request_host<B>(req: &Request<B>) -> Option<&str> {
    let raw = req
        .headers()
        .get("host")
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().host())?;

    match raw.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            Some(host)
        }
        _ => Some(raw),
    }
}
