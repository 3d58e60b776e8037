//! Ordered-map seams between the composite facade and the two tiers.

/// Ordered map over `u64` keys and opaque `u64` payloads.
///
/// Both tiers implement this surface; the facade and the migration worker
/// only rely on what is declared here (plus [`BulkLoadable`] on the read
/// tier).
pub trait OrderedIndex: Send + Sync {
    /// Replace the entire contents with `entries` (sorted by key, unique).
    fn build(&mut self, entries: Vec<(u64, u64)>);

    /// Point lookup.
    fn lookup(&self, key: u64) -> Option<u64>;

    /// Insert or overwrite a single entry.
    fn insert(&mut self, key: u64, value: u64);

    /// Remove a key. Returns whether the key was present.
    fn erase(&mut self, key: u64) -> bool;

    /// All live entries with key in `[lo, hi]`, ascending.
    fn range_entries(&self, lo: u64, hi: u64) -> Vec<(u64, u64)>;

    /// Sum of values over `[lo, hi]` (wrapping).
    fn range_sum(&self, lo: u64, hi: u64) -> u64 {
        self.range_entries(lo, hi)
            .iter()
            .fold(0u64, |acc, (_, v)| acc.wrapping_add(*v))
    }

    /// Number of live entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries.
    fn clear(&mut self);
}

/// Ordered map that can absorb a sorted batch without losing prior contents.
pub trait BulkLoadable: OrderedIndex {
    /// Merge a batch (sorted by key, unique) into the index.
    ///
    /// Prior contents are preserved; when a batch key already exists, the
    /// existing entry wins. A batch key can only collide with a live entry
    /// when a foreground write landed after the batch was snapshotted, so the
    /// live entry is the newer one.
    fn bulk_load(&mut self, sorted_entries: Vec<(u64, u64)>) -> anyhow::Result<()>;
}
