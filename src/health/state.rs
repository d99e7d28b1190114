//! Per-server health state machine.
//!
//! # States
//! - Unknown: first sight, treated as routable (optimistic)
//! - Up: server receives traffic
//! - Down: server excluded from load balancing
//!
//! # State Transitions
//! ```text
//! Up/Unknown → Down: consecutive failures >= unhealthy_threshold
//! Down → Up:         consecutive successes >= healthy_threshold
//! ```
//!
//! Active probes and passive request outcomes feed the same counters, so
//! the thresholds apply to whichever signal arrives first.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Health state of one server.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown = 0,
    Up = 1,
    Down = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Up,
            2 => HealthState::Down,
            _ => HealthState::Unknown,
        }
    }
}

/// Threshold pair shared by active and passive health signals.
#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    /// Consecutive failures before Down.
    pub unhealthy: u32,
    /// Consecutive successes before Up.
    pub healthy: u32,
}

/// Mutable health overlay for one server identity.
///
/// Lives in the [`HealthRegistry`](crate::health::registry::HealthRegistry)
/// arena, not in any configuration snapshot, so a rebuild that re-declares
/// the same server keeps its learned state. All fields are atomics; no lock
/// is taken on the request path.
#[derive(Debug, Default)]
pub struct HealthSlot {
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
    /// Successful builds this server has been absent from, for eviction.
    missed_builds: AtomicU32,
}

impl HealthSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HealthState {
        self.state.load(Ordering::Relaxed).into()
    }

    /// Routable means not confirmed Down; Unknown counts as up.
    pub fn is_up(&self) -> bool {
        self.state.load(Ordering::Relaxed) != HealthState::Down as u8
    }

    /// Record a successful probe or request. Returns true when this success
    /// transitioned the server back to Up, so callers can log the event.
    pub fn record_success(&self, thresholds: HealthThresholds) -> bool {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        if self.state.load(Ordering::Relaxed) == HealthState::Up as u8 {
            return false;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= thresholds.healthy {
            self.state.store(HealthState::Up as u8, Ordering::Relaxed);
            self.consecutive_successes.store(0, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// Record a failed probe or request. Returns true when this failure
    /// transitioned the server to Down.
    pub fn record_failure(&self, thresholds: HealthThresholds) -> bool {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        if self.state.load(Ordering::Relaxed) == HealthState::Down as u8 {
            return false;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= thresholds.unhealthy {
            self.state.store(HealthState::Down as u8, Ordering::Relaxed);
            self.consecutive_failures.store(0, Ordering::Relaxed);
            return true;
        }
        false
    }

    pub(crate) fn reset_missed_builds(&self) {
        self.missed_builds.store(0, Ordering::Relaxed);
    }

    /// Increment the missed-build counter and return the new value.
    pub(crate) fn note_missed_build(&self) -> u32 {
        self.missed_builds.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLDS: HealthThresholds = HealthThresholds {
        unhealthy: 3,
        healthy: 2,
    };

    #[test]
    fn test_initial_state_is_routable() {
        let slot = HealthSlot::new();
        assert_eq!(slot.state(), HealthState::Unknown);
        assert!(slot.is_up());
    }

    #[test]
    fn test_down_after_consecutive_failures() {
        let slot = HealthSlot::new();
        assert!(!slot.record_failure(THRESHOLDS));
        assert!(!slot.record_failure(THRESHOLDS));
        assert!(slot.is_up());
        assert!(slot.record_failure(THRESHOLDS));
        assert_eq!(slot.state(), HealthState::Down);
        assert!(!slot.is_up());
    }

    #[test]
    fn test_success_interrupts_failure_streak() {
        let slot = HealthSlot::new();
        slot.record_failure(THRESHOLDS);
        slot.record_failure(THRESHOLDS);
        slot.record_success(THRESHOLDS);
        // Streak reset: two more failures are not enough.
        slot.record_failure(THRESHOLDS);
        slot.record_failure(THRESHOLDS);
        assert!(slot.is_up());
    }

    #[test]
    fn test_recovery_needs_success_streak() {
        let slot = HealthSlot::new();
        for _ in 0..3 {
            slot.record_failure(THRESHOLDS);
        }
        assert!(!slot.is_up());

        assert!(!slot.record_success(THRESHOLDS));
        assert!(!slot.is_up());
        assert!(slot.record_success(THRESHOLDS));
        assert_eq!(slot.state(), HealthState::Up);
    }
}
