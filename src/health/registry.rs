//! Health overlay arena.
//!
//! Health state is keyed by stable server identity (the server URL), not
//! stored inside the per-reload configuration objects. A rebuild that keeps
//! a server therefore keeps its learned state; a server that stays absent
//! for `forget_after_builds` consecutive successful builds is evicted.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::health::state::HealthSlot;

/// Arena of per-server health slots, shared between the router builder,
/// the active prober and the request path.
#[derive(Debug, Default)]
pub struct HealthRegistry {
    slots: DashMap<String, Arc<HealthSlot>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the slot for a server identity, creating it on first sight.
    /// Called by the router builder for every server in a new table; also
    /// clears the eviction countdown since the server is live again.
    pub fn checkout(&self, url: &str) -> Arc<HealthSlot> {
        let slot = self
            .slots
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(HealthSlot::new()))
            .clone();
        slot.reset_missed_builds();
        slot
    }

    /// After a successful build, age out slots for servers the new table no
    /// longer references.
    pub fn sweep(&self, live: &HashSet<String>, forget_after_builds: u32) {
        self.slots.retain(|url, slot| {
            if live.contains(url) {
                return true;
            }
            let missed = slot.note_missed_build();
            if missed >= forget_after_builds {
                tracing::debug!(server = %url, "Dropping health state for departed server");
                return false;
            }
            true
        });
    }

    /// Immediately drop a server's learned state (operator override).
    pub fn forget(&self, url: &str) -> bool {
        self.slots.remove(url).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
