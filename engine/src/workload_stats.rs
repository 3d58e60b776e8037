//! Workload mix counters.
//!
//! Three monotone counters updated lock-free from the operation paths and
//! reset by the adaptive controller after each tick. The reset is not atomic
//! across fields; an increment landing on the tick boundary is counted in
//! whichever window observes it, which the control loop tolerates.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct WorkloadStats {
    inserts: AtomicU64,
    lookups: AtomicU64,
    migrations: AtomicU64,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadSnapshot {
    pub inserts: u64,
    pub lookups: u64,
    pub migrations: u64,
}

impl WorkloadSnapshot {
    /// Fraction of operations that were inserts, or `None` when idle.
    pub fn insert_ratio(&self) -> Option<f64> {
        let total = self.inserts + self.lookups;
        if total == 0 {
            None
        } else {
            Some(self.inserts as f64 / total as f64)
        }
    }
}

impl WorkloadStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_migration(&self) {
        self.migrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkloadSnapshot {
        WorkloadSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            lookups: self.lookups.load(Ordering::Relaxed),
            migrations: self.migrations.load(Ordering::Relaxed),
        }
    }

    /// Snapshot the counters and zero them for the next window.
    pub fn snapshot_and_reset(&self) -> WorkloadSnapshot {
        WorkloadSnapshot {
            inserts: self.inserts.swap(0, Ordering::Relaxed),
            lookups: self.lookups.swap(0, Ordering::Relaxed),
            migrations: self.migrations.swap(0, Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counters_and_reset() {
        let stats = WorkloadStats::new();
        stats.record_insert();
        stats.record_insert();
        stats.record_lookup();
        stats.record_migration();

        let snap = stats.snapshot();
        assert_eq!(snap.inserts, 2);
        assert_eq!(snap.lookups, 1);
        assert_eq!(snap.migrations, 1);

        let taken = stats.snapshot_and_reset();
        assert_eq!(taken, snap);
        assert_eq!(stats.snapshot().inserts, 0);
        assert_eq!(stats.snapshot().lookups, 0);
    }

    #[test]
    fn test_insert_ratio() {
        let stats = WorkloadStats::new();
        assert_eq!(stats.snapshot().insert_ratio(), None);

        for _ in 0..3 {
            stats.record_insert();
        }
        stats.record_lookup();
        let ratio = stats.snapshot().insert_ratio().unwrap();
        assert!((ratio - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_updates() {
        let stats = Arc::new(WorkloadStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_lookup();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.snapshot().lookups, 8000);
    }
}
