//! Run statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one request, shared by every target task
#[derive(Debug, Default)]
pub struct FetchStats {
    elements_staged: AtomicU64,
    elements_failed: AtomicU64,
    expansions_failed: AtomicU64,
    targets_failed: AtomicU64,
    bytes_staged: AtomicU64,
}

impl FetchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element_staged(&self, size: u64) {
        self.elements_staged.fetch_add(1, Ordering::Relaxed);
        self.bytes_staged.fetch_add(size, Ordering::Relaxed);
        tracing::debug!(counter = "elements_staged", size, "Metric incremented");
    }

    pub fn element_failed(&self) {
        self.elements_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "elements_failed", "Metric incremented");
    }

    pub fn expansion_failed(&self) {
        self.expansions_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "expansions_failed", "Metric incremented");
    }

    pub fn target_failed(&self) {
        self.targets_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "targets_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            elements_staged: self.elements_staged.load(Ordering::Relaxed),
            elements_failed: self.elements_failed.load(Ordering::Relaxed),
            expansions_failed: self.expansions_failed.load(Ordering::Relaxed),
            targets_failed: self.targets_failed.load(Ordering::Relaxed),
            bytes_staged: self.bytes_staged.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub elements_staged: u64,
    pub elements_failed: u64,
    pub expansions_failed: u64,
    pub targets_failed: u64,
    pub bytes_staged: u64,
}

impl StatsSnapshot {
    pub fn log(&self) {
        tracing::info!(
            elements_staged = self.elements_staged,
            elements_failed = self.elements_failed,
            expansions_failed = self.expansions_failed,
            targets_failed = self.targets_failed,
            bytes_staged = %crate::humanize::ByteSize(self.bytes_staged),
            "Fetch run finished"
        );
    }
}
