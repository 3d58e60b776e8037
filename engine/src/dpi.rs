//! Write-optimized tier: dynamic piecewise-geometric index.
//!
//! An immutable sorted base array is covered by fixed-span linear segments
//! (the piecewise-geometric approximation); point writes land in a delta
//! buffer and erases in a tombstone set. When the mutable overlay grows past
//! `merge_threshold`, base and overlay are compacted into a fresh base and
//! the segments are refit.
//!
//! Lookup order: delta → tombstones → segment-predicted window in the base.

use crate::index::OrderedIndex;
use crate::model::LinearModel;
use crate::search::{find_in_window, SearchKernel};
use std::collections::{BTreeMap, BTreeSet};

/// One linear segment over a contiguous run of the base array.
#[derive(Debug)]
struct Segment {
    first_key: u64,
    start: usize,
    len: usize,
    model: LinearModel,
}

/// Dynamic piecewise-geometric index over `u64` keys.
pub struct DynamicPgmIndex {
    base: Vec<(u64, u64)>,
    segments: Vec<Segment>,
    delta: BTreeMap<u64, u64>,
    tombstones: BTreeSet<u64>,
    live: usize,
    epsilon: usize,
    kernel: SearchKernel,
    merge_threshold: usize,
}

impl DynamicPgmIndex {
    /// Create an empty index.
    ///
    /// `epsilon` bounds the segment approximation error (and sets the segment
    /// span); `merge_threshold` bounds the delta + tombstone overlay before a
    /// compaction folds it into the base.
    pub fn new(epsilon: usize, kernel: SearchKernel, merge_threshold: usize) -> Self {
        Self {
            base: Vec::new(),
            segments: Vec::new(),
            delta: BTreeMap::new(),
            tombstones: BTreeSet::new(),
            live: 0,
            epsilon: epsilon.max(1),
            kernel,
            merge_threshold: merge_threshold.max(1),
        }
    }

    /// Entries pending in the delta buffer (diagnostics).
    pub fn delta_len(&self) -> usize {
        self.delta.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn set_base(&mut self, entries: Vec<(u64, u64)>) {
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        self.base = entries;
        self.live = self.base.len();
        self.rebuild_segments();
    }

    fn rebuild_segments(&mut self) {
        self.segments.clear();
        // Segment span scales with epsilon: a wider error bound tolerates
        // longer runs per model.
        let span = (self.epsilon * 4).max(16);
        let mut start = 0;
        while start < self.base.len() {
            let len = span.min(self.base.len() - start);
            let run = &self.base[start..start + len];
            self.segments.push(Segment {
                first_key: run[0].0,
                start,
                len,
                model: LinearModel::fit(run),
            });
            start += len;
        }
    }

    fn base_lookup(&self, key: u64) -> Option<u64> {
        if self.segments.is_empty() {
            return None;
        }
        let idx = self.segments.partition_point(|s| s.first_key <= key);
        if idx == 0 {
            return None;
        }
        let seg = &self.segments[idx - 1];
        if !seg.model.contains(key) {
            return None;
        }
        let run = &self.base[seg.start..seg.start + seg.len];
        let (lo, hi) = seg.model.window(key, 0);
        find_in_window(self.kernel, run, lo, hi, key).map(|pos| run[pos].1)
    }

    fn overlay_len(&self) -> usize {
        self.delta.len() + self.tombstones.len()
    }

    /// Fold delta and tombstones into a fresh base and refit segments.
    fn compact(&mut self) {
        let merged = self.range_entries(0, u64::MAX);
        self.delta.clear();
        self.tombstones.clear();
        self.set_base(merged);
    }
}

impl OrderedIndex for DynamicPgmIndex {
    fn build(&mut self, entries: Vec<(u64, u64)>) {
        self.delta.clear();
        self.tombstones.clear();
        self.set_base(entries);
    }

    fn lookup(&self, key: u64) -> Option<u64> {
        if let Some(v) = self.delta.get(&key) {
            return Some(*v);
        }
        if self.tombstones.contains(&key) {
            return None;
        }
        self.base_lookup(key)
    }

    fn insert(&mut self, key: u64, value: u64) {
        let was_present = self.lookup(key).is_some();
        self.tombstones.remove(&key);
        self.delta.insert(key, value);
        if !was_present {
            self.live += 1;
        }
        if self.overlay_len() >= self.merge_threshold {
            self.compact();
        }
    }

    fn erase(&mut self, key: u64) -> bool {
        let in_delta = self.delta.remove(&key).is_some();
        let in_base = !self.tombstones.contains(&key) && self.base_lookup(key).is_some();
        if in_base {
            self.tombstones.insert(key);
        }
        let present = in_delta || in_base;
        if present {
            self.live -= 1;
        }
        present
    }

    fn range_entries(&self, lo: u64, hi: u64) -> Vec<(u64, u64)> {
        let mut out = Vec::new();
        let start = self.base.partition_point(|(k, _)| *k < lo);
        for &(k, v) in &self.base[start..] {
            if k > hi {
                break;
            }
            // Delta and tombstones shadow the base.
            if self.tombstones.contains(&k) || self.delta.contains_key(&k) {
                continue;
            }
            out.push((k, v));
        }
        out.extend(self.delta.range(lo..=hi).map(|(k, v)| (*k, *v)));
        out.sort_unstable_by_key(|(k, _)| *k);
        out
    }

    fn len(&self) -> usize {
        self.live
    }

    fn clear(&mut self) {
        self.base.clear();
        self.segments.clear();
        self.delta.clear();
        self.tombstones.clear();
        self.live = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built(n: u64) -> DynamicPgmIndex {
        let mut dpi = DynamicPgmIndex::new(16, SearchKernel::Binary, 1000);
        dpi.build((0..n).map(|i| (i * 2, i * 10)).collect());
        dpi
    }

    #[test]
    fn test_build_and_lookup() {
        let dpi = built(1000);
        assert_eq!(dpi.len(), 1000);
        assert_eq!(dpi.lookup(0), Some(0));
        assert_eq!(dpi.lookup(998), Some(4990));
        assert_eq!(dpi.lookup(1998), Some(9990));
        // Odd keys were never inserted.
        assert_eq!(dpi.lookup(3), None);
        assert_eq!(dpi.lookup(5000), None);
    }

    #[test]
    fn test_insert_overwrites_base() {
        let mut dpi = built(100);
        dpi.insert(10, 777);
        assert_eq!(dpi.lookup(10), Some(777));
        assert_eq!(dpi.len(), 100);

        dpi.insert(1001, 1);
        assert_eq!(dpi.lookup(1001), Some(1));
        assert_eq!(dpi.len(), 101);
    }

    #[test]
    fn test_erase_base_and_delta() {
        let mut dpi = built(10);
        assert!(dpi.erase(4));
        assert_eq!(dpi.lookup(4), None);
        assert_eq!(dpi.len(), 9);
        assert!(!dpi.erase(4));

        dpi.insert(4, 40);
        assert_eq!(dpi.lookup(4), Some(40));
        assert_eq!(dpi.len(), 10);

        dpi.insert(100, 5);
        assert!(dpi.erase(100));
        assert_eq!(dpi.lookup(100), None);
    }

    #[test]
    fn test_range_merges_base_and_delta() {
        let mut dpi = built(10); // keys 0,2,..,18
        dpi.insert(5, 50);
        dpi.erase(6);
        let entries = dpi.range_entries(2, 9);
        assert_eq!(entries, vec![(2, 10), (4, 20), (5, 50), (8, 40)]);
        assert_eq!(dpi.range_sum(2, 9), 120);
    }

    #[test]
    fn test_compaction_preserves_contents() {
        let mut dpi = DynamicPgmIndex::new(8, SearchKernel::Interpolation, 32);
        dpi.build((0..100u64).map(|i| (i, i)).collect());
        for i in 100..200u64 {
            dpi.insert(i, i);
        }
        for i in 0..10u64 {
            dpi.erase(i);
        }
        // Overlay crossed the threshold several times; everything must still
        // resolve.
        assert!(dpi.delta_len() < 32);
        assert_eq!(dpi.len(), 190);
        assert_eq!(dpi.lookup(5), None);
        assert_eq!(dpi.lookup(150), Some(150));
        assert_eq!(dpi.range_sum(0, 20), (10..=20).sum::<u64>());
    }

    #[test]
    fn test_kernels_resolve_identically() {
        for kernel in [
            SearchKernel::Binary,
            SearchKernel::Linear,
            SearchKernel::Interpolation,
            SearchKernel::Exponential,
        ] {
            let mut dpi = DynamicPgmIndex::new(16, kernel, 1000);
            dpi.build((0..500u64).map(|i| (i * 7, i)).collect());
            assert_eq!(dpi.lookup(7 * 123), Some(123), "kernel {}", kernel.name());
            assert_eq!(dpi.lookup(7 * 123 + 1), None);
        }
    }

    #[test]
    fn test_empty_index() {
        let dpi = DynamicPgmIndex::new(16, SearchKernel::Binary, 100);
        assert!(dpi.is_empty());
        assert_eq!(dpi.lookup(1), None);
        assert!(dpi.range_entries(0, u64::MAX).is_empty());
    }
}
