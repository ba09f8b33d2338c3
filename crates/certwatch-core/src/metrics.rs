//! Global atomic counters for certwatch observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a pipeline run).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    samples_taken: AtomicU64,
    checks_passed: AtomicU64,
    checks_failed: AtomicU64,
    artifacts_unavailable: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            samples_taken: AtomicU64::new(0),
            checks_passed: AtomicU64::new(0),
            checks_failed: AtomicU64::new(0),
            artifacts_unavailable: AtomicU64::new(0),
        }
    }

    /// One poll sample read from a catalog container.
    pub fn inc_samples(&self) {
        self.samples_taken.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "samples_taken", "counter incremented");
    }

    pub fn inc_checks_passed(&self) {
        self.checks_passed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "checks_passed", "counter incremented");
    }

    pub fn inc_checks_failed(&self) {
        self.checks_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "checks_failed", "counter incremented");
    }

    /// An artifact the aggregator expected but could not read or parse.
    pub fn inc_artifacts_unavailable(&self) {
        self.artifacts_unavailable.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "artifacts_unavailable", "counter incremented");
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            samples_taken = self.samples_taken(),
            checks_passed = self.checks_passed(),
            checks_failed = self.checks_failed(),
            artifacts_unavailable = self.artifacts_unavailable(),
        );
    }

    pub fn samples_taken(&self) -> u64 {
        self.samples_taken.load(Ordering::Relaxed)
    }

    pub fn checks_passed(&self) -> u64 {
        self.checks_passed.load(Ordering::Relaxed)
    }

    pub fn checks_failed(&self) -> u64 {
        self.checks_failed.load(Ordering::Relaxed)
    }

    pub fn artifacts_unavailable(&self) -> u64 {
        self.artifacts_unavailable.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.samples_taken.store(0, Ordering::Relaxed);
        self.checks_passed.store(0, Ordering::Relaxed);
        self.checks_failed.store(0, Ordering::Relaxed);
        self.artifacts_unavailable.store(0, Ordering::Relaxed);
    }
}
