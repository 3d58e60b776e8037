//! Read-optimized tier: learned interpolation tree.
//!
//! A two-level structure: a router of leaf boundary keys on top, sorted leaf
//! runs below. Each leaf carries a fitted linear model; lookups probe the
//! model-predicted slot and correct inside the measured error window with the
//! configured kernel. Point inserts are tolerated (sorted insert into the
//! owning leaf, split on overflow) but the structure is built to be fed by
//! sorted bulk loads.
//!
//! `bulk_load` merges: prior contents survive, and on a key collision the
//! resident entry wins over the batch entry (the batch was snapshotted
//! earlier, so the resident copy is the newer write).

use crate::index::{BulkLoadable, OrderedIndex};
use crate::model::LinearModel;
use crate::search::{find_in_window, SearchKernel};
use anyhow::bail;

struct Leaf {
    entries: Vec<(u64, u64)>,
    model: LinearModel,
}

impl Leaf {
    fn from_entries(entries: Vec<(u64, u64)>) -> Self {
        let model = LinearModel::fit(&entries);
        Self { entries, model }
    }

    fn refit(&mut self) {
        self.model = LinearModel::fit(&self.entries);
    }

    fn first_key(&self) -> u64 {
        self.entries[0].0
    }
}

/// Learned interpolation tree over `u64` keys.
pub struct InterpolationTree {
    leaves: Vec<Leaf>,
    /// First key of each leaf, kept in lockstep with `leaves`.
    router: Vec<u64>,
    kernel: SearchKernel,
    leaf_cap: usize,
    live: usize,
}

impl InterpolationTree {
    pub fn new(kernel: SearchKernel, leaf_cap: usize) -> Self {
        Self {
            leaves: Vec::new(),
            router: Vec::new(),
            kernel,
            leaf_cap: leaf_cap.max(8),
            live: 0,
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Index of the leaf owning `key`: the rightmost leaf whose first key is
    /// ≤ `key`, or leaf 0 when `key` precedes everything.
    fn leaf_for(&self, key: u64) -> usize {
        self.router.partition_point(|k| *k <= key).saturating_sub(1)
    }

    fn all_entries(&self) -> Vec<(u64, u64)> {
        let mut out = Vec::with_capacity(self.live);
        for leaf in &self.leaves {
            out.extend_from_slice(&leaf.entries);
        }
        out
    }

    fn rebuild_from(&mut self, entries: Vec<(u64, u64)>) {
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        self.live = entries.len();
        self.leaves.clear();
        self.router.clear();
        if entries.is_empty() {
            return;
        }
        let mut entries = entries;
        let leaf_count = entries.len().div_ceil(self.leaf_cap);
        let per_leaf = entries.len().div_ceil(leaf_count);
        while !entries.is_empty() {
            let rest = entries.split_off(per_leaf.min(entries.len()));
            let leaf = Leaf::from_entries(entries);
            self.router.push(leaf.first_key());
            self.leaves.push(leaf);
            entries = rest;
        }
    }

    fn split_leaf(&mut self, idx: usize) {
        let right_entries = {
            let leaf = &mut self.leaves[idx];
            let mid = leaf.entries.len() / 2;
            let right = leaf.entries.split_off(mid);
            leaf.refit();
            right
        };
        let right = Leaf::from_entries(right_entries);
        self.router.insert(idx + 1, right.first_key());
        self.leaves.insert(idx + 1, right);
    }
}

impl OrderedIndex for InterpolationTree {
    fn build(&mut self, entries: Vec<(u64, u64)>) {
        self.rebuild_from(entries);
    }

    fn lookup(&self, key: u64) -> Option<u64> {
        if self.leaves.is_empty() {
            return None;
        }
        let leaf = &self.leaves[self.leaf_for(key)];
        let (lo, hi) = leaf.model.window(key, 0);
        find_in_window(self.kernel, &leaf.entries, lo, hi, key).map(|pos| leaf.entries[pos].1)
    }

    fn insert(&mut self, key: u64, value: u64) {
        if self.leaves.is_empty() {
            self.rebuild_from(vec![(key, value)]);
            return;
        }
        let idx = self.leaf_for(key);
        let leaf = &mut self.leaves[idx];
        match leaf.entries.binary_search_by_key(&key, |(k, _)| *k) {
            Ok(pos) => {
                leaf.entries[pos].1 = value;
                return;
            }
            Err(pos) => {
                leaf.entries.insert(pos, (key, value));
                leaf.refit();
                self.live += 1;
            }
        }
        self.router[idx] = self.leaves[idx].first_key();
        if self.leaves[idx].entries.len() > 2 * self.leaf_cap {
            self.split_leaf(idx);
        }
    }

    fn erase(&mut self, key: u64) -> bool {
        if self.leaves.is_empty() {
            return false;
        }
        let idx = self.leaf_for(key);
        let leaf = &mut self.leaves[idx];
        match leaf.entries.binary_search_by_key(&key, |(k, _)| *k) {
            Ok(pos) => {
                leaf.entries.remove(pos);
                self.live -= 1;
                if leaf.entries.is_empty() {
                    self.leaves.remove(idx);
                    self.router.remove(idx);
                } else {
                    leaf.refit();
                    self.router[idx] = self.leaves[idx].first_key();
                }
                true
            }
            Err(_) => false,
        }
    }

    fn range_entries(&self, lo: u64, hi: u64) -> Vec<(u64, u64)> {
        let mut out = Vec::new();
        if self.leaves.is_empty() {
            return out;
        }
        for leaf in &self.leaves[self.leaf_for(lo)..] {
            if leaf.first_key() > hi {
                break;
            }
            let start = leaf.entries.partition_point(|(k, _)| *k < lo);
            for &(k, v) in &leaf.entries[start..] {
                if k > hi {
                    return out;
                }
                out.push((k, v));
            }
        }
        out
    }

    fn len(&self) -> usize {
        self.live
    }

    fn clear(&mut self) {
        self.leaves.clear();
        self.router.clear();
        self.live = 0;
    }
}

impl BulkLoadable for InterpolationTree {
    fn bulk_load(&mut self, sorted_entries: Vec<(u64, u64)>) -> anyhow::Result<()> {
        if sorted_entries.windows(2).any(|w| w[0].0 >= w[1].0) {
            bail!("bulk load batch must be strictly sorted by key");
        }
        if self.leaves.is_empty() {
            self.rebuild_from(sorted_entries);
            return Ok(());
        }

        // Merge resident entries with the batch; resident wins on conflict.
        let existing = self.all_entries();
        let mut merged = Vec::with_capacity(existing.len() + sorted_entries.len());
        let mut batch = sorted_entries.into_iter().peekable();
        for (k, v) in existing {
            while let Some(&(bk, bv)) = batch.peek() {
                if bk < k {
                    merged.push((bk, bv));
                    batch.next();
                } else if bk == k {
                    batch.next();
                } else {
                    break;
                }
            }
            merged.push((k, v));
        }
        merged.extend(batch);
        self.rebuild_from(merged);
        Ok(())
    }
}
