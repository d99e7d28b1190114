//! Circuit breaker for backend protection.
//!
//! # States
//! ```text
//! Closed → Open:      error rate (or mean latency) over the rolling window
//!                     breaches the configured threshold
//! Open → Half-Open:   cooldown elapsed; one probe request admitted
//! Half-Open → Closed: probe succeeds (window reset)
//! Half-Open → Open:   probe fails (cooldown restarts)
//! ```
//!
//! # Design Decisions
//! - Per backend pool, not global
//! - Open fails fast: the request is rejected before any backend contact
//! - Probes are paced, not counted in flight, so an abandoned probe can
//!   never wedge the breaker in Half-Open
//! - Breakers live in a registry keyed by backend name: a rebuild that keeps
//!   a backend (with an unchanged spec) keeps its breaker state

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::dynamic::CircuitBreakerSpec;

/// Breaker state, exposed for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Verdict for one incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Forward normally and record the outcome.
    Allowed,
    /// Forward as the recovery probe; the outcome decides the next state.
    Probe,
    /// Fail fast with 503, no backend contact.
    Rejected,
}

#[derive(Debug)]
struct Sample {
    at: Instant,
    ok: bool,
    latency: Duration,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    samples: VecDeque<Sample>,
    opened_at: Instant,
    next_probe_at: Instant,
}

/// Rolling-window circuit breaker for one backend pool.
#[derive(Debug)]
pub struct CircuitBreaker {
    spec: CircuitBreakerSpec,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(spec: CircuitBreakerSpec) -> Self {
        let now = Instant::now();
        Self {
            spec,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                samples: VecDeque::new(),
                opened_at: now,
                next_probe_at: now,
            }),
        }
    }

    pub fn spec(&self) -> &CircuitBreakerSpec {
        &self.spec
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap().state
    }

    /// Decide whether a request may be forwarded right now.
    pub fn admit(&self) -> Admission {
        self.admit_at(Instant::now())
    }

    fn admit_at(&self, now: Instant) -> Admission {
        let mut inner = self.inner.lock().unwrap();
        let cooldown = Duration::from_secs(self.spec.cooldown_secs);
        match inner.state {
            BreakerState::Closed => Admission::Allowed,
            BreakerState::Open => {
                if now.duration_since(inner.opened_at) >= cooldown {
                    inner.state = BreakerState::HalfOpen;
                    inner.next_probe_at = now + cooldown;
                    Admission::Probe
                } else {
                    Admission::Rejected
                }
            }
            BreakerState::HalfOpen => {
                if now >= inner.next_probe_at {
                    inner.next_probe_at = now + cooldown;
                    Admission::Probe
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    /// Record a forwarded attempt's outcome.
    pub fn record(&self, admission: Admission, ok: bool, latency: Duration) {
        self.record_at(admission, ok, latency, Instant::now());
    }

    fn record_at(&self, admission: Admission, ok: bool, latency: Duration, now: Instant) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::HalfOpen if admission == Admission::Probe => {
                if ok {
                    tracing::info!("Circuit closed after successful probe");
                    inner.state = BreakerState::Closed;
                    inner.samples.clear();
                } else {
                    tracing::warn!("Circuit re-opened after failed probe");
                    inner.state = BreakerState::Open;
                    inner.opened_at = now;
                }
            }
            BreakerState::Closed => {
                inner.samples.push_back(Sample { at: now, ok, latency });
                self.trim(&mut inner, now);
                if self.should_open(&inner) {
                    tracing::warn!(
                        samples = inner.samples.len(),
                        "Circuit opened, failing fast"
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = now;
                }
            }
            // Late outcomes from requests admitted before the state changed.
            _ => {}
        }
    }

    fn trim(&self, inner: &mut Inner, now: Instant) {
        let window = Duration::from_secs(self.spec.window_secs);
        while let Some(front) = inner.samples.front() {
            if now.duration_since(front.at) > window {
                inner.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn should_open(&self, inner: &Inner) -> bool {
        let total = inner.samples.len();
        if total < self.spec.min_samples {
            return false;
        }

        let errors = inner.samples.iter().filter(|s| !s.ok).count();
        if errors as f64 / total as f64 > self.spec.max_error_rate {
            return true;
        }

        if let Some(max_mean_ms) = self.spec.max_mean_latency_ms {
            let total_ms: u128 = inner.samples.iter().map(|s| s.latency.as_millis()).sum();
            if total_ms / total as u128 > u128::from(max_mean_ms) {
                return true;
            }
        }
        false
    }
}

#[derive(Debug)]
struct BreakerEntry {
    breaker: Arc<CircuitBreaker>,
    missed_builds: AtomicU32,
}

/// Arena of circuit breakers keyed by backend name, mirroring the health
/// registry: state survives rebuilds for as long as the backend persists.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    entries: DashMap<String, BreakerEntry>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the breaker for a backend, reusing the existing one when the
    /// spec is unchanged and replacing it when the operator reconfigured it.
    pub fn checkout(&self, backend: &str, spec: &CircuitBreakerSpec) -> Arc<CircuitBreaker> {
        let entry = self.entries.entry(backend.to_string()).or_insert_with(|| BreakerEntry {
            breaker: Arc::new(CircuitBreaker::new(spec.clone())),
            missed_builds: AtomicU32::new(0),
        });
        entry.missed_builds.store(0, Ordering::Relaxed);
        if entry.breaker.spec() != spec {
            let replacement = Arc::new(CircuitBreaker::new(spec.clone()));
            drop(entry);
            self.entries.insert(
                backend.to_string(),
                BreakerEntry {
                    breaker: replacement.clone(),
                    missed_builds: AtomicU32::new(0),
                },
            );
            return replacement;
        }
        entry.breaker.clone()
    }

    /// Age out breakers for backends absent from the latest build.
    pub fn sweep(&self, live: &std::collections::HashSet<String>, forget_after_builds: u32) {
        self.entries.retain(|backend, entry| {
            if live.contains(backend) {
                return true;
            }
            entry.missed_builds.fetch_add(1, Ordering::Relaxed) + 1 < forget_after_builds
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
