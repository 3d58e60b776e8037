//! Composite two-tier index facade.
//!
//! Coordinates both tiers behind a single key-value interface:
//! - **Write tier (DPI)**: absorbs inserts cheaply; every cold key lives here.
//! - **Read tier (LIT)**: fast point lookups; hot keys migrate in over time.
//!
//! # Lookup path
//! ```text
//! point_lookup → LIT ──hit──▶ return (record access)
//!                 │ miss
//!                 ▼
//!                DPI ──hit──▶ return (record access, maybe enqueue)
//!                 │ miss
//!                 ▼
//!                LIT again (migration may have moved the key) ──▶ None
//! ```
//!
//! # Write path
//! ```text
//! insert → hot or read-tier resident? ──▶ LIT
//!               │ otherwise
//!               ▼
//!              DPI ──(every N inserts)──▶ flush check ──▶ wake worker
//! ```
//!
//! The facade owns the migration worker and the adaptive controller as
//! joinable threads; dropping the index signals both and joins them before
//! clearing shared state.

use crate::config::{BuildPolicy, EmberConfig};
use crate::controller::{spawn_controller, ControllerConfig};
use crate::dpi::DynamicPgmIndex;
use crate::index::OrderedIndex;
use crate::key_stats::DetectorParams;
use crate::lit::InterpolationTree;
use crate::metrics;
use crate::migration::{
    flush_due, flush_params, spawn_migration_worker, SharedState, WorkerConfig,
};
use crate::workload_stats::WorkloadSnapshot;
use ahash::AHashSet;
use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Worker wake interval; kept below the shortest flush wait so the
/// time-based flush arm fires without an explicit wake.
const WORKER_POLL_MS: u64 = 20;

/// Point-in-time statistics across both tiers and the migration machinery.
#[derive(Debug, Clone)]
pub struct HybridIndexStats {
    pub dpi_entries: usize,
    pub lit_entries: usize,
    pub hot_keys: usize,
    pub queue_depth: usize,
    pub key_stats_entries: usize,
    pub migration_threshold: f64,
    /// Counters for the current controller window.
    pub window: WorkloadSnapshot,
}

/// Hybrid two-tier learned index over `u64` keys and `u64` payloads.
pub struct HybridIndex {
    shared: Arc<SharedState>,
    detector: DetectorParams,
    config: EmberConfig,
    worker: Option<JoinHandle<()>>,
    controller: Option<JoinHandle<()>>,
    inserts_since_check: AtomicU64,
}

impl HybridIndex {
    /// Create an empty index and start the background tasks.
    pub fn new(config: EmberConfig) -> Result<Self> {
        config.validate()?;

        let dpi = DynamicPgmIndex::new(
            config.epsilon,
            config.search_kernel,
            config.dpi_merge_threshold,
        );
        let lit = InterpolationTree::new(config.search_kernel, config.lit_leaf_cap);
        let shared = Arc::new(SharedState::new(
            dpi,
            lit,
            config.batch_max,
            config.initial_threshold(),
        ));

        let worker = Some(spawn_migration_worker(
            Arc::clone(&shared),
            WorkerConfig {
                batch_max: config.batch_max,
                poll_interval: Duration::from_millis(WORKER_POLL_MS),
            },
        ));
        let controller = if config.adaptive_mode {
            Some(spawn_controller(
                Arc::clone(&shared),
                ControllerConfig {
                    tick: config.controller_tick(),
                    stats_ttl: config.stats_ttl(),
                },
            ))
        } else {
            None
        };

        info!(
            threshold = config.initial_threshold(),
            adaptive = config.adaptive_mode,
            epsilon = config.epsilon,
            kernel = config.search_kernel.name(),
            "hybrid index created"
        );

        Ok(Self {
            shared,
            detector: config.detector_params(),
            config,
            worker,
            controller,
            inserts_since_check: AtomicU64::new(0),
        })
    }

    /// Create from the positional benchmark parameter vector.
    pub fn from_params(params: &[i64]) -> Result<Self> {
        Self::new(EmberConfig::from_params(params)?)
    }

    /// Bulk-initialize both tiers, replacing any prior contents.
    ///
    /// Returns the elapsed wall time. `parallelism` is accepted for interface
    /// compatibility; the build itself is single-threaded.
    pub fn build(&self, entries: Vec<(u64, u64)>, parallelism: usize) -> Duration {
        let started = Instant::now();
        let deduped = sort_dedup_last_wins(entries);

        {
            let mut core = self.shared.core.lock();
            core.queue.clear();
            core.stats.clear();
            core.hot_keys.clear();
            core.last_flush = Instant::now();
        }

        match self.config.build_policy {
            BuildPolicy::DpiWithPrewarm => {
                let warm = middle_sample(&deduped, self.config.prewarm_limit);
                self.shared.dpi.write().build(deduped);
                self.shared.lit.write().build(warm);
            }
            BuildPolicy::FullLit => {
                self.shared.dpi.write().clear();
                self.shared.lit.write().build(deduped);
            }
        }
        self.inserts_since_check.store(0, Ordering::Relaxed);

        let elapsed = started.elapsed();
        info!(
            entries = self.size(),
            parallelism,
            elapsed_ms = elapsed.as_millis() as u64,
            "bulk build complete"
        );
        elapsed
    }

    /// Point lookup: read tier first, write tier as fallback.
    pub fn point_lookup(&self, key: u64) -> Option<u64> {
        self.shared.workload.record_lookup();
        metrics::LOOKUPS_TOTAL.inc();

        if let Some(value) = self.shared.lit.read().lookup(key) {
            metrics::LIT_HITS_TOTAL.inc();
            self.note_access(key, false);
            return Some(value);
        }
        if let Some(value) = self.shared.dpi.read().lookup(key) {
            metrics::DPI_HITS_TOTAL.inc();
            self.note_access(key, false);
            return Some(value);
        }
        // A key mid-migration leaves the write tier only after it has been
        // loaded into the read tier. If the first read-tier probe ran before
        // the load and the write-tier probe after the evict, the key is
        // visible to a second read-tier probe.
        if let Some(value) = self.shared.lit.read().lookup(key) {
            metrics::LIT_HITS_TOTAL.inc();
            self.note_access(key, false);
            return Some(value);
        }
        metrics::LOOKUP_MISSES_TOTAL.inc();
        None
    }

    /// Sum of values over keys in `[lo, hi]`.
    ///
    /// The write tier is scanned before the read tier: a migrating key is
    /// evicted from the write tier only after it is resident in the read
    /// tier, so with this ordering every live key appears in at least one
    /// scan. Keys present in both count once, with the read-tier value
    /// (foreground writes to hot keys land there).
    pub fn range_query(&self, lo: u64, hi: u64) -> u64 {
        let dpi_entries = self.shared.dpi.read().range_entries(lo, hi);
        let lit_entries = self.shared.lit.read().range_entries(lo, hi);

        let mut lit_keys: AHashSet<u64> = AHashSet::with_capacity(lit_entries.len());
        let mut sum = 0u64;
        for (key, value) in lit_entries {
            sum = sum.wrapping_add(value);
            lit_keys.insert(key);
        }
        for (key, value) in dpi_entries {
            if !lit_keys.contains(&key) {
                sum = sum.wrapping_add(value);
            }
        }
        sum
    }

    /// Insert or overwrite an entry.
    ///
    /// Hot keys and read-tier residents are written to the read tier (where
    /// lookups resolve first); everything else goes to the write tier.
    pub fn insert(&self, key: u64, value: u64) {
        self.shared.workload.record_insert();
        metrics::INSERTS_TOTAL.inc();

        let known_hot = self.note_access(key, true);
        if known_hot || self.shared.lit.read().lookup(key).is_some() {
            self.shared.lit.write().insert(key, value);
        } else {
            self.shared.dpi.write().insert(key, value);
        }

        let count = self.inserts_since_check.fetch_add(1, Ordering::Relaxed) + 1;
        if count % self.config.inserts_per_check == 0 {
            self.maybe_wake_worker();
        }
    }

    /// Total entries across both tiers (both-resident keys count twice, as
    /// they occupy space twice).
    pub fn size(&self) -> usize {
        self.shared.dpi.read().len() + self.shared.lit.read().len()
    }

    pub fn name(&self) -> &'static str {
        "ember_hybrid"
    }

    /// The ε variant this index was configured with.
    pub fn variant(&self) -> String {
        self.config.epsilon.to_string()
    }

    pub fn search_kernel(&self) -> &'static str {
        self.config.search_kernel.name()
    }

    /// Whether this configuration can run the given workload shape.
    pub fn applicable(
        &self,
        _unique: bool,
        _range_query: bool,
        _insert: bool,
        multithread: bool,
        _workload_name: &str,
    ) -> bool {
        !self.config.search_kernel.is_avx() && !multithread
    }

    pub fn stats(&self) -> HybridIndexStats {
        let core = self.shared.core.lock();
        HybridIndexStats {
            dpi_entries: self.shared.dpi.read().len(),
            lit_entries: self.shared.lit.read().len(),
            hot_keys: core.hot_keys.len(),
            queue_depth: core.queue.len(),
            key_stats_entries: core.stats.len(),
            migration_threshold: core.threshold,
            window: self.shared.workload.snapshot(),
        }
    }

    /// Whether `key` was committed to the read tier by a migration.
    pub fn is_hot_key(&self, key: u64) -> bool {
        self.shared.core.lock().hot_keys.contains(&key)
    }

    pub fn hot_key_count(&self) -> usize {
        self.shared.core.lock().hot_keys.len()
    }

    pub fn queue_depth(&self) -> usize {
        self.shared.core.lock().queue.len()
    }

    /// Current migration size threshold θ.
    pub fn threshold(&self) -> f64 {
        self.shared.core.lock().threshold
    }

    /// Record an access for the detector and wake the worker when warranted.
    ///
    /// Lookup callers pass `blocking = false`: the detector update is skipped
    /// on core-mutex contention so lookups never stall behind the worker.
    /// Returns whether the key is known hot.
    fn note_access(&self, key: u64, blocking: bool) -> bool {
        let mut core = if blocking {
            self.shared.core.lock()
        } else {
            match self.shared.core.try_lock() {
                Some(guard) => guard,
                None => return false,
            }
        };

        let outcome = core
            .stats
            .record_access(key, Instant::now(), &self.detector);
        if outcome.newly_hot {
            core.queue.enqueue(key);
            debug!(key, "key classified hot");
        }
        let known_hot = outcome.is_hot || core.hot_keys.contains(&key);

        let wake = outcome.consecutive >= 3
            || (!core.queue.is_empty() && {
                let target = batch_target(
                    core.threshold,
                    self.shared.dpi.read().len(),
                    self.config.batch_max,
                );
                core.queue.len() >= target
            });
        drop(core);

        if wake && !self.shared.migration_in_progress.load(Ordering::Acquire) {
            self.shared.work_cv.notify_one();
        }
        known_hot
    }

    /// Evaluate the flush predicate and wake the worker if a batch is due.
    fn maybe_wake_worker(&self) {
        let ratio = self
            .shared
            .workload
            .snapshot()
            .insert_ratio()
            .unwrap_or(0.0);
        let params = flush_params(ratio);
        let due = flush_due(&self.shared.core.lock(), &params, Instant::now());
        if due && !self.shared.migration_in_progress.load(Ordering::Acquire) {
            self.shared.work_cv.notify_one();
        }
    }

    fn shutdown(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.work_cv.notify_all();
        self.shared.tick_cv.notify_all();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.controller.take() {
            let _ = handle.join();
        }
        // The worker is joined, but guard against a straggling batch anyway.
        while self.shared.migration_in_progress.load(Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(1));
        }
        let mut core = self.shared.core.lock();
        core.queue.clear();
        core.stats.clear();
        core.hot_keys.clear();
        debug!("hybrid index shut down");
    }
}

impl Drop for HybridIndex {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Detector wake target: θ scaled by the write-tier population, clamped to a
/// single batch.
fn batch_target(threshold: f64, dpi_len: usize, batch_max: usize) -> usize {
    ((threshold * dpi_len as f64).ceil() as usize)
        .max(1)
        .min(batch_max)
}

/// Sort by key; for duplicate keys the last occurrence wins.
fn sort_dedup_last_wins(mut entries: Vec<(u64, u64)>) -> Vec<(u64, u64)> {
    entries.sort_by_key(|(k, _)| *k);
    let mut out: Vec<(u64, u64)> = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        match out.last_mut() {
            Some(last) if last.0 == key => last.1 = value,
            _ => out.push((key, value)),
        }
    }
    out
}

/// Contiguous sample of up to `limit` entries from the middle of a sorted run.
fn middle_sample(entries: &[(u64, u64)], limit: usize) -> Vec<(u64, u64)> {
    if entries.is_empty() || limit == 0 {
        return Vec::new();
    }
    let take = limit.min(entries.len());
    let start = (entries.len() - take) / 2;
    entries[start..start + take].to_vec()
}
