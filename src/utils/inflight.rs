//! In-flight request tracking for graceful draining.
//!
//! Every request entering the router holds an [`InflightGuard`] for its whole
//! lifetime. When the grace period runs out the lifecycle reports how many
//! requests were still open.
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::metrics;

#[derive(Clone, Default)]
pub struct InflightTracker {
    active: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
}

impl InflightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a request as started; it is finished when the guard drops.
    pub fn begin(&self) -> InflightGuard {
        let active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        self.total.fetch_add(1, Ordering::Relaxed);
        metrics::set_active_requests(active);
        InflightGuard {
            active: self.active.clone(),
        }
    }

    /// Number of requests currently being handled.
    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Acquire)
    }

    /// Number of requests seen since startup.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// RAII marker for one in-flight request.
pub struct InflightGuard {
    active: Arc<AtomicU64>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        let active = self.active.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        metrics::set_active_requests(active);
    }
}
