//! Per-key access accounting and hot-key classification.
//!
//! Every successful lookup or insert records an access. A key turns hot when
//! it is touched repeatedly in a short window, or often enough overall once
//! the per-key migration cooldown has passed. The adaptive controller is the
//! only component that removes entries (aging pass); hot or queued keys are
//! never aged out, so a queued key keeps routing writes to the read tier
//! while its migration is in flight.

use ahash::AHashMap;
use std::time::{Duration, Instant};

/// Detector thresholds, sourced from [`crate::config::EmberConfig`].
#[derive(Debug, Clone)]
pub struct DetectorParams {
    /// Two accesses closer than this count as consecutive.
    pub consecutive_window: Duration,
    /// Consecutive accesses that make a key hot.
    pub hot_consecutive: u32,
    /// Total accesses that make a key hot (subject to cooldown).
    pub hot_count: u32,
    /// Minimum spacing between migrations of the same key.
    pub migration_cooldown: Duration,
}

/// Access record for a single key.
#[derive(Debug, Clone)]
pub struct KeyStats {
    pub access_count: u32,
    pub consecutive_accesses: u32,
    pub last_access: Instant,
    pub last_migration: Option<Instant>,
    pub is_hot: bool,
}

impl KeyStats {
    fn new(now: Instant) -> Self {
        Self {
            access_count: 0,
            consecutive_accesses: 0,
            last_access: now,
            last_migration: None,
            is_hot: false,
        }
    }
}

/// Result of recording one access.
#[derive(Debug, Clone, Copy)]
pub struct AccessOutcome {
    /// The key crossed a hot threshold on this access.
    pub newly_hot: bool,
    /// The key is hot (now or from an earlier access).
    pub is_hot: bool,
    /// Consecutive-access streak after this access.
    pub consecutive: u32,
}

/// Lazily populated table of per-key access records.
#[derive(Default)]
pub struct KeyStatsTable {
    map: AHashMap<u64, KeyStats>,
}

impl KeyStatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an access and classify the key.
    pub fn record_access(
        &mut self,
        key: u64,
        now: Instant,
        params: &DetectorParams,
    ) -> AccessOutcome {
        let stats = self.map.entry(key).or_insert_with(|| KeyStats::new(now));

        if now.duration_since(stats.last_access) < params.consecutive_window {
            stats.consecutive_accesses += 1;
        } else {
            stats.consecutive_accesses = 1;
        }
        stats.access_count = stats.access_count.saturating_add(1);
        stats.last_access = now;

        let cooled = stats
            .last_migration
            .map_or(true, |t| now.duration_since(t) >= params.migration_cooldown);
        let hot = stats.consecutive_accesses >= params.hot_consecutive
            || (stats.access_count >= params.hot_count && cooled);

        let newly_hot = hot && !stats.is_hot;
        if newly_hot {
            stats.is_hot = true;
            stats.last_migration = Some(now);
        }

        AccessOutcome {
            newly_hot,
            is_hot: stats.is_hot,
            consecutive: stats.consecutive_accesses,
        }
    }

    pub fn get(&self, key: u64) -> Option<&KeyStats> {
        self.map.get(&key)
    }

    pub fn is_hot(&self, key: u64) -> bool {
        self.map.get(&key).is_some_and(|s| s.is_hot)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drop entries whose last access is older than `ttl`.
    ///
    /// Hot entries and entries for which `retain` returns true (queued keys)
    /// survive regardless of age. Returns the number of dropped entries.
    pub fn age_out(
        &mut self,
        now: Instant,
        ttl: Duration,
        retain: impl Fn(u64) -> bool,
    ) -> usize {
        let before = self.map.len();
        self.map.retain(|key, stats| {
            stats.is_hot || retain(*key) || now.duration_since(stats.last_access) < ttl
        });
        before - self.map.len()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> DetectorParams {
        DetectorParams {
            consecutive_window: Duration::from_millis(50),
            hot_consecutive: 2,
            hot_count: 3,
            migration_cooldown: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_consecutive_accesses_turn_hot() {
        let mut table = KeyStatsTable::new();
        let p = params();
        let t0 = Instant::now();

        let first = table.record_access(7, t0, &p);
        assert!(!first.newly_hot);
        assert_eq!(first.consecutive, 1);

        let second = table.record_access(7, t0 + Duration::from_millis(10), &p);
        assert!(second.newly_hot, "second close access crosses the streak threshold");
        assert!(second.is_hot);
        assert_eq!(second.consecutive, 2);

        // Already hot; never reported as newly hot again.
        let third = table.record_access(7, t0 + Duration::from_millis(20), &p);
        assert!(!third.newly_hot);
        assert!(third.is_hot);
    }

    #[test]
    fn test_streak_resets_outside_window() {
        let mut table = KeyStatsTable::new();
        let p = params();
        let t0 = Instant::now();

        table.record_access(1, t0, &p);
        let late = table.record_access(1, t0 + Duration::from_millis(80), &p);
        assert_eq!(late.consecutive, 1, "gap past the window resets the streak");
        assert!(!late.is_hot);
    }

    #[test]
    fn test_spaced_accesses_turn_hot_by_count() {
        let mut table = KeyStatsTable::new();
        let p = params();
        let t0 = Instant::now();
        let step = Duration::from_millis(80); // outside the streak window

        assert!(!table.record_access(2, t0, &p).newly_hot);
        assert!(!table.record_access(2, t0 + step, &p).newly_hot);
        let third = table.record_access(2, t0 + step * 2, &p);
        assert!(third.newly_hot, "third access crosses the count threshold");
    }

    #[test]
    fn test_count_threshold_respects_cooldown() {
        let mut table = KeyStatsTable::new();
        let p = params();
        let t0 = Instant::now();
        let step = Duration::from_millis(80);

        // Force a synthetic prior migration just now.
        table.record_access(3, t0, &p);
        table.map.get_mut(&3).unwrap().last_migration = Some(t0);
        table.map.get_mut(&3).unwrap().is_hot = false;

        table.record_access(3, t0 + step, &p);
        let third = table.record_access(3, t0 + step * 2, &p);
        assert!(
            !third.newly_hot,
            "count rule must not fire inside the cooldown"
        );

        let cooled = table.record_access(3, t0 + Duration::from_secs(2), &p);
        assert!(cooled.newly_hot);
    }

    #[test]
    fn test_monotone_counters() {
        let mut table = KeyStatsTable::new();
        let p = params();
        let t0 = Instant::now();

        let mut last_count = 0;
        for i in 0..20u64 {
            let _ = table.record_access(9, t0 + Duration::from_millis(i), &p);
            let stats = table.get(9).unwrap();
            assert!(stats.access_count > last_count);
            last_count = stats.access_count;
        }
    }

    #[test]
    fn test_age_out_retains_hot_and_queued() {
        let mut table = KeyStatsTable::new();
        let p = params();
        let t0 = Instant::now();
        let ttl = Duration::from_millis(250);

        table.record_access(1, t0, &p); // cold, will age out
        table.record_access(2, t0, &p); // queued, survives
        table.record_access(3, t0, &p);
        table.record_access(3, t0 + Duration::from_millis(1), &p); // hot, survives

        let dropped = table.age_out(t0 + Duration::from_millis(300), ttl, |k| k == 2);
        assert_eq!(dropped, 1);
        assert!(table.get(1).is_none());
        assert!(table.get(2).is_some());
        assert!(table.get(3).is_some());

        // A fresh access after aging starts from scratch.
        let fresh = table.record_access(1, t0 + Duration::from_millis(400), &p);
        assert_eq!(fresh.consecutive, 1);
        assert_eq!(table.get(1).unwrap().access_count, 1);
    }
}
