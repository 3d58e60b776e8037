//! Adaptive parameter controller.
//!
//! A dedicated thread that, every tick, reshapes the migration size
//! threshold θ from the observed insert/lookup mix and ages out stale
//! key-stats entries. Write storms push θ up (migrate less, keep insert
//! throughput); lookup-heavy phases pull θ down (migrate eagerly, cash in on
//! the read tier).

use crate::metrics;
use crate::migration::SharedState;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Hard bounds on θ.
pub const THRESHOLD_MIN: f64 = 0.005;
pub const THRESHOLD_MAX: f64 = 0.3;

#[derive(Debug, Clone)]
pub(crate) struct ControllerConfig {
    pub tick: Duration,
    pub stats_ttl: Duration,
}

pub(crate) fn spawn_controller(
    shared: Arc<SharedState>,
    cfg: ControllerConfig,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("ember-controller".into())
        .spawn(move || controller_loop(&shared, &cfg))
        .expect("failed to spawn adaptive controller thread")
}

fn controller_loop(shared: &SharedState, cfg: &ControllerConfig) {
    debug!(tick_ms = cfg.tick.as_millis() as u64, "adaptive controller started");
    loop {
        {
            let mut guard = shared.tick_lock.lock();
            if shared.stop.load(Ordering::Acquire) {
                break;
            }
            shared.tick_cv.wait_for(&mut guard, cfg.tick);
        }
        if shared.stop.load(Ordering::Acquire) {
            break;
        }
        run_tick(shared, cfg);
    }
    debug!("adaptive controller stopped");
}

/// One controller iteration: adjust θ, age the stats table, reset the
/// workload window.
pub(crate) fn run_tick(shared: &SharedState, cfg: &ControllerConfig) {
    let window = shared.workload.snapshot_and_reset();
    let now = Instant::now();

    let mut core = shared.core.lock();
    if let Some(ratio) = window.insert_ratio() {
        let adjusted = adjust_threshold(core.threshold, ratio);
        trace!(ratio, from = core.threshold, to = adjusted, "threshold adjusted");
        core.threshold = adjusted;
    }

    let crate::migration::CoreState { queue, stats, .. } = &mut *core;
    let aged = stats.age_out(now, cfg.stats_ttl, |key| queue.contains(key));

    metrics::MIGRATION_THRESHOLD.set(core.threshold);
    metrics::QUEUE_DEPTH.set(core.queue.len() as i64);
    metrics::KEY_STATS_ENTRIES.set(core.stats.len() as i64);
    if aged > 0 {
        metrics::STATS_AGED_TOTAL.inc_by(aged as u64);
        trace!(aged, "aged out stale key stats");
    }
}

/// θ update rule. Insert-heavy mixes back off migration; lookup-heavy mixes
/// lean into it; mixed traffic decays θ gently toward its floor.
pub fn adjust_threshold(theta: f64, insert_ratio: f64) -> f64 {
    let adjusted = if insert_ratio > 0.7 {
        (theta * 1.02).min(0.1)
    } else if insert_ratio < 0.3 {
        (theta * 0.98).max(0.005)
    } else {
        (theta * 0.99).max(0.01)
    };
    adjusted.clamp(THRESHOLD_MIN, THRESHOLD_MAX)
}
