//! Connection Pool Statistics
//!
//! Counters are updated lock-free on every acquire/release; [`PoolStats`] is
//! an immutable snapshot of them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Live counters owned by a pool
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub acquires: AtomicU64,
    pub releases: AtomicU64,
    pub creates: AtomicU64,
    pub destroys: AtomicU64,
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub acquire_errors: AtomicU64,
}

impl PoolCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn load(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Point-in-time pool statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStats {
    pub acquires: u64,
    pub releases: u64,
    pub creates: u64,
    pub destroys: u64,
    pub hits: u64,
    pub misses: u64,
    pub acquire_errors: u64,
    /// Connections currently open, idle or checked out
    pub open_connections: u32,
    pub idle_connections: u32,
    pub max_connections: u32,
    #[serde(skip)]
    pub uptime: Duration,
}

impl PoolStats {
    pub(crate) fn snapshot(
        counters: &PoolCounters,
        open_connections: u32,
        idle_connections: u32,
        max_connections: u32,
        created_at: Instant,
    ) -> Self {
        Self {
            acquires: PoolCounters::load(&counters.acquires),
            releases: PoolCounters::load(&counters.releases),
            creates: PoolCounters::load(&counters.creates),
            destroys: PoolCounters::load(&counters.destroys),
            hits: PoolCounters::load(&counters.hits),
            misses: PoolCounters::load(&counters.misses),
            acquire_errors: PoolCounters::load(&counters.acquire_errors),
            open_connections,
            idle_connections,
            max_connections,
            uptime: created_at.elapsed(),
        }
    }

    /// hits / (hits + misses), or 0.0 before the first acquire
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate the error rate as a percentage
    pub fn error_rate(&self) -> f64 {
        if self.acquires > 0 {
            (self.acquire_errors as f64 / self.acquires as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Connections checked out right now
    pub fn active_connections(&self) -> u32 {
        self.open_connections.saturating_sub(self.idle_connections)
    }

    /// Get pool utilization as a percentage (active / max)
    pub fn utilization(&self) -> f64 {
        if self.max_connections > 0 {
            (self.active_connections() as f64 / self.max_connections as f64) * 100.0
        } else {
            0.0
        }
    }
}
