use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct TrackerMetrics {
    pub mutations_committed: AtomicU64,
    pub mutations_rolled_back: AtomicU64,
    pub mutations_abandoned: AtomicU64,
    pub activations_ignored: AtomicU64,
    pub activations_refused: AtomicU64,
    pub cache_replacements: AtomicU64,
    pub fetch_failures: AtomicU64,
}

impl TrackerMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            mutations_committed: self.mutations_committed.load(Ordering::Relaxed),
            mutations_rolled_back: self.mutations_rolled_back.load(Ordering::Relaxed),
            mutations_abandoned: self.mutations_abandoned.load(Ordering::Relaxed),
            activations_ignored: self.activations_ignored.load(Ordering::Relaxed),
            activations_refused: self.activations_refused.load(Ordering::Relaxed),
            cache_replacements: self.cache_replacements.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub mutations_committed: u64,
    pub mutations_rolled_back: u64,
    pub mutations_abandoned: u64,
    pub activations_ignored: u64,
    pub activations_refused: u64,
    pub cache_replacements: u64,
    pub fetch_failures: u64,
}
