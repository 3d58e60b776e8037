//! Hot-key migration: queue, shared state, and the background worker.
//!
//! The worker moves batches of hot keys from the write tier (DPI) into the
//! read tier (LIT):
//!
//! ```text
//! IDLE ──wake──▶ DRAIN ──▶ LOOKUP ──▶ BULKLOAD ──▶ EVICT ──▶ COMMIT ──▶ IDLE
//!                                         │
//!                                         └── on error ──▶ ROLLBACK ──▶ IDLE
//! ```
//!
//! Lock discipline: the core mutex is held only while draining the queue and
//! during the final commit/rollback bookkeeping. Tier locks are never held
//! across the core mutex acquisition. Re-entrancy is excluded by the
//! `migration_in_progress` compare-and-swap; only one batch runs at a time.

use crate::dpi::DynamicPgmIndex;
use crate::index::{BulkLoadable, OrderedIndex};
use crate::key_stats::KeyStatsTable;
use crate::lit::InterpolationTree;
use crate::metrics;
use crate::workload_stats::WorkloadStats;
use ahash::AHashSet;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Ordered, deduplicated set of keys awaiting migration.
///
/// Enqueue is idempotent and capped, so the pending set can never outgrow a
/// single migration batch.
pub struct MigrationQueue {
    keys: BTreeSet<u64>,
    cap: usize,
}

impl MigrationQueue {
    pub fn new(cap: usize) -> Self {
        Self {
            keys: BTreeSet::new(),
            cap: cap.max(1),
        }
    }

    /// Add a key. Returns false when already pending or at capacity.
    pub fn enqueue(&mut self, key: u64) -> bool {
        if self.keys.len() >= self.cap && !self.keys.contains(&key) {
            return false;
        }
        self.keys.insert(key)
    }

    pub fn contains(&self, key: u64) -> bool {
        self.keys.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Take everything pending, leaving the queue empty.
    pub fn drain_snapshot(&mut self) -> Vec<u64> {
        let snapshot: Vec<u64> = self.keys.iter().copied().collect();
        self.keys.clear();
        snapshot
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

/// State guarded by the core mutex.
pub(crate) struct CoreState {
    pub queue: MigrationQueue,
    pub stats: KeyStatsTable,
    pub hot_keys: AHashSet<u64>,
    pub last_flush: Instant,
    /// Migration size threshold θ, adjusted by the controller.
    pub threshold: f64,
}

/// Handle shared between the facade, the migration worker, and the adaptive
/// controller.
pub(crate) struct SharedState {
    pub core: Mutex<CoreState>,
    /// Wakes the migration worker.
    pub work_cv: Condvar,
    /// Paces the controller between ticks.
    pub tick_lock: Mutex<()>,
    pub tick_cv: Condvar,
    pub dpi: RwLock<DynamicPgmIndex>,
    pub lit: RwLock<InterpolationTree>,
    pub workload: WorkloadStats,
    pub migration_in_progress: AtomicBool,
    pub stop: AtomicBool,
}

impl SharedState {
    pub fn new(
        dpi: DynamicPgmIndex,
        lit: InterpolationTree,
        batch_max: usize,
        initial_threshold: f64,
    ) -> Self {
        Self {
            core: Mutex::new(CoreState {
                queue: MigrationQueue::new(batch_max),
                stats: KeyStatsTable::new(),
                hot_keys: AHashSet::new(),
                last_flush: Instant::now(),
                threshold: initial_threshold,
            }),
            work_cv: Condvar::new(),
            tick_lock: Mutex::new(()),
            tick_cv: Condvar::new(),
            dpi: RwLock::new(dpi),
            lit: RwLock::new(lit),
            workload: WorkloadStats::new(),
            migration_in_progress: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        }
    }
}

/// Flush thresholds derived from the current workload mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushParams {
    pub min_batch: usize,
    pub max_wait: Duration,
}

/// Insert-heavy workloads batch larger and flush sooner; lookup-heavy
/// workloads tolerate a longer wait for a fuller batch.
pub fn flush_params(insert_ratio: f64) -> FlushParams {
    if insert_ratio > 0.7 {
        FlushParams {
            min_batch: 100,
            max_wait: Duration::from_millis(50),
        }
    } else {
        FlushParams {
            min_batch: 200,
            max_wait: Duration::from_millis(150),
        }
    }
}

pub(crate) fn flush_due(core: &CoreState, params: &FlushParams, now: Instant) -> bool {
    !core.queue.is_empty()
        && (core.queue.len() >= params.min_batch
            || now.duration_since(core.last_flush) >= params.max_wait)
}

#[derive(Debug, Clone)]
pub(crate) struct WorkerConfig {
    /// Upper bound on keys per migration batch.
    pub batch_max: usize,
    /// Worker wake interval; must stay below the smallest `max_wait` so the
    /// time-based flush arm fires without an explicit wake.
    pub poll_interval: Duration,
}

pub(crate) fn spawn_migration_worker(
    shared: Arc<SharedState>,
    cfg: WorkerConfig,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("ember-migration".into())
        .spawn(move || worker_loop(&shared, &cfg))
        .expect("failed to spawn migration worker thread")
}

fn worker_loop(shared: &SharedState, cfg: &WorkerConfig) {
    debug!("migration worker started");
    loop {
        let batch = {
            let mut core = shared.core.lock();
            if shared.stop.load(Ordering::Acquire) {
                break;
            }
            shared.work_cv.wait_for(&mut core, cfg.poll_interval);
            if shared.stop.load(Ordering::Acquire) {
                break;
            }

            let ratio = shared
                .workload
                .snapshot()
                .insert_ratio()
                .unwrap_or(0.0);
            if !flush_due(&core, &flush_params(ratio), Instant::now()) {
                continue;
            }
            if shared
                .migration_in_progress
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                continue;
            }
            let mut batch = core.queue.drain_snapshot();
            batch.truncate(cfg.batch_max);
            batch
        };
        run_migration(shared, batch);
    }
    debug!("migration worker stopped");
}

/// Execute one migration batch. The `migration_in_progress` flag is owned by
/// the caller and released here on every path.
pub(crate) fn run_migration(shared: &SharedState, batch: Vec<u64>) {
    let started = Instant::now();

    // LOOKUP: fetch payloads from the write tier. Keys that vanished since
    // they were enqueued are dropped silently.
    let mut entries: Vec<(u64, u64)> = Vec::with_capacity(batch.len());
    {
        let dpi = shared.dpi.read();
        for &key in &batch {
            if let Some(value) = dpi.lookup(key) {
                entries.push((key, value));
            }
        }
    }

    if entries.is_empty() {
        let mut core = shared.core.lock();
        core.last_flush = Instant::now();
        drop(core);
        shared.migration_in_progress.store(false, Ordering::Release);
        debug!(enqueued = batch.len(), "migration batch had no resident keys");
        return;
    }

    // BULKLOAD: merge the sorted batch into the read tier.
    entries.sort_unstable_by_key(|(k, _)| *k);
    let keys: Vec<u64> = entries.iter().map(|(k, _)| *k).collect();
    let load_result = shared.lit.write().bulk_load(entries);

    match load_result {
        Ok(()) => {
            // EVICT: drop the migrated keys from the write tier. A failed
            // erase leaves a both-resident transient, which readers tolerate.
            {
                let mut dpi = shared.dpi.write();
                for &key in &keys {
                    if !dpi.erase(key) {
                        warn!(key, "migrated key already absent from write tier");
                    }
                }
            }
            commit_batch(shared, &keys, started);
        }
        Err(e) => {
            error!(error = %e, keys = keys.len(), "bulk load failed, rolling back batch");
            rollback_batch(shared, &keys);
        }
    }
}

fn commit_batch(shared: &SharedState, keys: &[u64], started: Instant) {
    let mut core = shared.core.lock();
    core.hot_keys.extend(keys.iter().copied());
    core.last_flush = Instant::now();
    drop(core);

    shared.workload.record_migration();
    metrics::MIGRATIONS_TOTAL.inc();
    metrics::MIGRATED_KEYS_TOTAL.inc_by(keys.len() as u64);
    metrics::MIGRATION_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());
    shared.migration_in_progress.store(false, Ordering::Release);
    debug!(keys = keys.len(), "migration batch committed");
}

/// Undo the hot markers for a failed batch. The write tier still owns every
/// key, so no data is lost; the keys will be re-detected naturally.
fn rollback_batch(shared: &SharedState, keys: &[u64]) {
    let mut core = shared.core.lock();
    for key in keys {
        core.hot_keys.remove(key);
    }
    drop(core);

    metrics::MIGRATION_ROLLBACKS_TOTAL.inc();
    shared.migration_in_progress.store(false, Ordering::Release);
}
