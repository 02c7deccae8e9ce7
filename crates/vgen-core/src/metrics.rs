//! Process-wide pipeline counters.
//!
//! Incremented at the call site; [`Metrics::flush`] logs a snapshot, which the
//! orchestrator does once per finished run.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    runs_started: AtomicU64,
    repairs_applied: AtomicU64,
    verifications: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            repairs_applied: AtomicU64::new(0),
            verifications: AtomicU64::new(0),
        }
    }

    pub fn inc_runs_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_started", "counter incremented");
    }

    /// One artifact regenerated from suggestions.
    pub fn inc_repairs(&self) {
        self.repairs_applied.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "repairs_applied", "counter incremented");
    }

    pub fn inc_verifications(&self) {
        self.verifications.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "verifications", "counter incremented");
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            runs_started = self.runs_started(),
            repairs_applied = self.repairs_applied(),
            verifications = self.verifications(),
        );
    }

    pub fn runs_started(&self) -> u64 {
        self.runs_started.load(Ordering::Relaxed)
    }

    pub fn repairs_applied(&self) -> u64 {
        self.repairs_applied.load(Ordering::Relaxed)
    }

    pub fn verifications(&self) -> u64 {
        self.verifications.load(Ordering::Relaxed)
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.runs_started.store(0, Ordering::Relaxed);
        self.repairs_applied.store(0, Ordering::Relaxed);
        self.verifications.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_and_reset() {
        let m = Metrics::new();
        m.inc_runs_started();
        m.inc_repairs();
        m.inc_repairs();
        m.inc_verifications();
        assert_eq!(m.runs_started(), 1);
        assert_eq!(m.repairs_applied(), 2);
        assert_eq!(m.verifications(), 1);

        m.reset();
        assert_eq!(m.repairs_applied(), 0);
        assert_eq!(m.verifications(), 0);
    }
}
