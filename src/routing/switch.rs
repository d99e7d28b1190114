//! The live-table switch.
//!
//! Holds the currently-served [`RoutingTable`] behind an atomically
//! swappable reference. Readers take an `Arc` snapshot that stays valid and
//! fully functional for the lifetime of their request; `publish` replaces
//! the pointer in one atomic step without blocking anyone. The old table is
//! reclaimed once its last reader finishes. `ArcSwap` rather than `RwLock`
//! keeps the hot path free of read locks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::observability::metrics;
use crate::routing::table::RoutingTable;

#[derive(Debug)]
pub struct TableSwitch {
    inner: ArcSwap<RoutingTable>,
    generation: AtomicU64,
}

impl TableSwitch {
    /// A switch serving the empty table: everything 404s until the first
    /// successful build is published.
    pub fn empty() -> Self {
        Self {
            inner: ArcSwap::from_pointee(RoutingTable::empty()),
            generation: AtomicU64::new(0),
        }
    }

    /// Atomically replace the live table. Returns the new generation.
    pub fn publish(&self, table: RoutingTable) -> u64 {
        let routes = table.route_count();
        self.inner.store(Arc::new(table));
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::record_table_swap(generation);
        tracing::info!(generation, routes, "Routing table published");
        generation
    }

    /// Snapshot of the live table, usable for one whole request.
    pub fn current(&self) -> Arc<RoutingTable> {
        self.inner.load_full()
    }

    /// Number of tables published so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }
}

impl Default for TableSwitch {
    fn default() -> Self {
        Self::empty()
    }
}
