// engine/src/config.rs
//
// Configuration for the hybrid index.
//
// Priority order (highest to lowest):
// 1. Environment variables (EMBERDB__* prefix)
// 2. Config file (TOML)
// 3. Built-in defaults
//
// Design principles:
// - Sensible defaults (works out of the box)
// - Type-safe enums instead of strings
// - Clear validation errors at construction

use crate::search::SearchKernel;
use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Segment error bounds exercised by the benchmark matrix.
pub const SUPPORTED_EPSILONS: [usize; 7] = [8, 16, 32, 64, 128, 256, 512];

/// How `build` distributes the initial entry set across the tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BuildPolicy {
    /// Load everything into the write tier and pre-warm the read tier with a
    /// contiguous sample from the middle of the key space.
    #[default]
    DpiWithPrewarm,
    /// Load everything into the read tier and leave the write tier empty.
    FullLit,
}

/// Tunable parameters of the hybrid index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmberConfig {
    /// Starting migration size threshold θ, in percent (3 ⇒ 0.03).
    pub migration_threshold_pct: f64,

    /// Run the adaptive controller. When false, θ stays fixed and key stats
    /// are never aged.
    pub adaptive_mode: bool,

    /// Segment approximation error bound ε.
    pub epsilon: usize,

    /// Kernel used inside model-predicted search windows.
    pub search_kernel: SearchKernel,

    /// Initial placement of bulk-built entries.
    pub build_policy: BuildPolicy,

    /// Read-tier pre-warm sample size for `BuildPolicy::DpiWithPrewarm`.
    pub prewarm_limit: usize,

    /// Consecutive accesses that make a key hot.
    pub hot_consecutive: u32,

    /// Total accesses that make a key hot (subject to the cooldown).
    pub hot_count: u32,

    /// Accesses closer than this count as consecutive (milliseconds).
    pub consecutive_window_ms: u64,

    /// Minimum spacing between migrations of the same key (milliseconds).
    pub migration_cooldown_ms: u64,

    /// Key stats older than this are aged out (milliseconds).
    pub stats_ttl_ms: u64,

    /// Adaptive controller period (milliseconds).
    pub controller_tick_ms: u64,

    /// Upper bound on keys per migration batch.
    pub batch_max: usize,

    /// Flush predicate is evaluated every this many inserts.
    pub inserts_per_check: u64,

    /// Write-tier delta buffer size that triggers a compaction.
    pub dpi_merge_threshold: usize,

    /// Read-tier leaf target size.
    pub lit_leaf_cap: usize,
}

impl Default for EmberConfig {
    fn default() -> Self {
        Self {
            migration_threshold_pct: 3.0,
            adaptive_mode: true,
            epsilon: 64,
            search_kernel: SearchKernel::Binary,
            build_policy: BuildPolicy::DpiWithPrewarm,
            prewarm_limit: 100_000,
            hot_consecutive: 2,
            hot_count: 3,
            consecutive_window_ms: 50,
            migration_cooldown_ms: 1_000,
            stats_ttl_ms: 250,
            controller_tick_ms: 100,
            batch_max: 1_000,
            inserts_per_check: 50,
            dpi_merge_threshold: 10_000,
            lit_leaf_cap: 256,
        }
    }
}

impl EmberConfig {
    /// Build a config from the positional benchmark parameter vector:
    /// index 0 = starting θ in percent, index 1 = adaptive mode flag.
    pub fn from_params(params: &[i64]) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(&pct) = params.first() {
            ensure!(
                (1..=30).contains(&pct),
                "migration threshold must be in 1..=30 percent, got {}",
                pct
            );
            cfg.migration_threshold_pct = pct as f64;
        }
        if let Some(&mode) = params.get(1) {
            cfg.adaptive_mode = mode != 0;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read config file {}", p.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("failed to parse config file {}", p.display()))?
            }
            None => Self::default(),
        };
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(raw) = env_var("EMBERDB__MIGRATION_THRESHOLD_PCT") {
            self.migration_threshold_pct = raw
                .parse()
                .context("EMBERDB__MIGRATION_THRESHOLD_PCT must be a number")?;
        }
        if let Some(raw) = env_var("EMBERDB__ADAPTIVE_MODE") {
            self.adaptive_mode = parse_bool(&raw)
                .context("EMBERDB__ADAPTIVE_MODE must be a boolean")?;
        }
        if let Some(raw) = env_var("EMBERDB__EPSILON") {
            self.epsilon = raw.parse().context("EMBERDB__EPSILON must be an integer")?;
        }
        if let Some(raw) = env_var("EMBERDB__SEARCH_KERNEL") {
            self.search_kernel = match raw.as_str() {
                "binary" => SearchKernel::Binary,
                "linear" => SearchKernel::Linear,
                "interpolation" => SearchKernel::Interpolation,
                "exponential" => SearchKernel::Exponential,
                "linear_avx" => SearchKernel::LinearAvx,
                other => bail!("unknown search kernel {:?}", other),
            };
        }
        if let Some(raw) = env_var("EMBERDB__BATCH_MAX") {
            self.batch_max = raw.parse().context("EMBERDB__BATCH_MAX must be an integer")?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.migration_threshold_pct > 0.0 && self.migration_threshold_pct <= 30.0,
            "migration_threshold_pct must be in (0, 30], got {}",
            self.migration_threshold_pct
        );
        ensure!(
            SUPPORTED_EPSILONS.contains(&self.epsilon),
            "epsilon must be one of {:?}, got {}",
            SUPPORTED_EPSILONS,
            self.epsilon
        );
        ensure!(self.hot_consecutive >= 1, "hot_consecutive must be >= 1");
        ensure!(self.hot_count >= 1, "hot_count must be >= 1");
        ensure!(self.batch_max >= 1, "batch_max must be >= 1");
        ensure!(self.inserts_per_check >= 1, "inserts_per_check must be >= 1");
        ensure!(self.controller_tick_ms >= 1, "controller_tick_ms must be >= 1");
        ensure!(self.stats_ttl_ms >= 1, "stats_ttl_ms must be >= 1");
        ensure!(
            self.dpi_merge_threshold >= 1,
            "dpi_merge_threshold must be >= 1"
        );
        ensure!(self.lit_leaf_cap >= 8, "lit_leaf_cap must be >= 8");
        Ok(())
    }

    /// Starting θ as a fraction.
    pub fn initial_threshold(&self) -> f64 {
        self.migration_threshold_pct / 100.0
    }

    pub fn consecutive_window(&self) -> Duration {
        Duration::from_millis(self.consecutive_window_ms)
    }

    pub fn migration_cooldown(&self) -> Duration {
        Duration::from_millis(self.migration_cooldown_ms)
    }

    pub fn stats_ttl(&self) -> Duration {
        Duration::from_millis(self.stats_ttl_ms)
    }

    pub fn controller_tick(&self) -> Duration {
        Duration::from_millis(self.controller_tick_ms)
    }

    pub fn detector_params(&self) -> crate::key_stats::DetectorParams {
        crate::key_stats::DetectorParams {
            consecutive_window: self.consecutive_window(),
            hot_consecutive: self.hot_consecutive,
            hot_count: self.hot_count,
            migration_cooldown: self.migration_cooldown(),
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("not a boolean: {:?}", other),
    }
}
