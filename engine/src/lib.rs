//! EmberDB - adaptive two-tier learned index engine
//!
//! Combines a write-optimized dynamic piecewise-geometric index (DPI) with a
//! read-optimized learned interpolation tree (LIT) behind a single key-value
//! interface. A background worker migrates hot keys from the write tier into
//! the read tier; an adaptive controller tunes the migration threshold to the
//! observed insert/lookup mix.

// ===== Core modules =====

// Linear position models shared by both tiers
pub mod model;

// Window search kernels (binary, linear, interpolation, exponential)
pub mod search;

// Ordered-map traits between the facade and the tiers
pub mod index;

// Write tier: dynamic piecewise-geometric index (segments + delta buffer)
pub mod dpi;

// Read tier: learned interpolation tree (router + modeled leaves)
pub mod lit;

// Per-key access accounting and hot-key detection
pub mod key_stats;

// Workload mix counters (reset every controller tick)
pub mod workload_stats;

// Migration queue, shared state, and the background migration worker
pub mod migration;

// Adaptive threshold controller and key-stats aging
pub mod controller;

// Composite facade: build / point_lookup / range_query / insert
pub mod hybrid_index;

// Metrics and observability: Prometheus counters and gauges
pub mod metrics;

// Configuration management: TOML parsing, env vars, validation
pub mod config;

// ===== Public API =====

pub use config::{BuildPolicy, EmberConfig, SUPPORTED_EPSILONS};
pub use controller::{adjust_threshold, THRESHOLD_MAX, THRESHOLD_MIN};
pub use dpi::DynamicPgmIndex;
pub use hybrid_index::{HybridIndex, HybridIndexStats};
pub use index::{BulkLoadable, OrderedIndex};
pub use key_stats::{AccessOutcome, DetectorParams, KeyStats, KeyStatsTable};
pub use lit::InterpolationTree;
pub use migration::{flush_params, FlushParams, MigrationQueue};
pub use model::LinearModel;
pub use search::SearchKernel;
pub use workload_stats::{WorkloadSnapshot, WorkloadStats};
