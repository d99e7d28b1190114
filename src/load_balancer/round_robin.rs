//! Rotation-based selection strategies.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::eligible;
use crate::load_balancer::server::PoolServer;

/// Classic round-robin: a shared cursor walks the declared order, skipping
/// servers that are down or excluded.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pick(&self, servers: &[Arc<PoolServer>], excluded: &[String]) -> Option<Arc<PoolServer>> {
        if servers.is_empty() {
            return None;
        }

        let start = self.counter.fetch_add(1, Ordering::Relaxed);
        let len = servers.len();
        for i in 0..len {
            let candidate = &servers[(start + i) % len];
            if eligible(candidate, excluded) {
                return Some(candidate.clone());
            }
        }
        None
    }
}

/// Health-aware rotation: the cursor indexes the currently-up subset, so
/// surviving servers keep an even rotation while others are down.
#[derive(Debug, Default)]
pub struct HealthAware {
    counter: AtomicUsize,
}

impl HealthAware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pick(&self, servers: &[Arc<PoolServer>], excluded: &[String]) -> Option<Arc<PoolServer>> {
        let up: Vec<&Arc<PoolServer>> = servers.iter().filter(|s| eligible(s, excluded)).collect();
        if up.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % up.len();
        Some(up[index].clone())
    }
}
