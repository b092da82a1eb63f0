//! Reconcile counters exposed by the metrics endpoint

use serde::Serialize;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Engine-wide counters, updated lock-free by workers
#[derive(Debug, Default)]
pub struct EngineStats {
    watches: AtomicU64,
    reconciles: AtomicU64,
    successes: AtomicU64,
    errors: AtomicU64,
    panics: AtomicU64,
    requeues: AtomicU64,
}

/// Copy of [`EngineStats`] at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub watches: u64,
    pub reconciles: u64,
    pub successes: u64,
    pub errors: u64,
    pub panics: u64,
    pub requeues: u64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn watch_added(&self) {
        self.watches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reconcile_started(&self) {
        self.reconciles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reconcile_succeeded(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reconcile_failed(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reconcile_panicked(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn requeued(&self) {
        self.requeues.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            watches: self.watches.load(Ordering::Relaxed),
            reconciles: self.reconciles.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
            requeues: self.requeues.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Render in the Prometheus text exposition format
    pub fn to_prometheus(&self) -> String {
        let metrics: [(&str, &str, &str, u64); 6] = [
            ("kubeplug_watches", "gauge", "Active controller watches", self.watches),
            (
                "kubeplug_reconcile_total",
                "counter",
                "Reconcile calls started",
                self.reconciles,
            ),
            (
                "kubeplug_reconcile_success_total",
                "counter",
                "Reconcile calls that returned Ok",
                self.successes,
            ),
            (
                "kubeplug_reconcile_errors_total",
                "counter",
                "Reconcile calls that returned an error",
                self.errors,
            ),
            (
                "kubeplug_reconcile_panics_total",
                "counter",
                "Reconcile calls that panicked",
                self.panics,
            ),
            (
                "kubeplug_requeue_total",
                "counter",
                "Keys scheduled for another reconcile",
                self.requeues,
            ),
        ];

        let mut out = String::new();
        for (name, kind, help, value) in metrics {
            // Writing to a String cannot fail
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} {kind}");
            let _ = writeln!(out, "{name} {value}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = EngineStats::new();
        stats.watch_added();
        stats.reconcile_started();
        stats.reconcile_started();
        stats.reconcile_succeeded();
        stats.reconcile_failed();
        stats.requeued();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.watches, 1);
        assert_eq!(snapshot.reconciles, 2);
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.panics, 0);
        assert_eq!(snapshot.requeues, 1);
    }

    #[test]
    fn test_prometheus_render() {
        let stats = EngineStats::new();
        stats.reconcile_started();
        stats.reconcile_panicked();

        let text = stats.snapshot().to_prometheus();
        assert!(text.contains("# TYPE kubeplug_reconcile_total counter"));
        assert!(text.contains("kubeplug_reconcile_total 1\n"));
        assert!(text.contains("kubeplug_reconcile_panics_total 1\n"));
        assert!(text.contains("kubeplug_watches 0\n"));
    }
}
