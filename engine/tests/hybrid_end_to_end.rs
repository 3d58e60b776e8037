// End-to-end coverage of the public surface: build policies, lookups,
// inserts, range sums, and the benchmark-facing metadata.

use emberdb_engine::{BuildPolicy, EmberConfig, HybridIndex};

fn base_config() -> EmberConfig {
    // No pre-warm: lookups start on the write tier so the migration path is
    // exercised from a cold read tier.
    EmberConfig {
        prewarm_limit: 0,
        ..EmberConfig::default()
    }
}

#[test]
fn test_build_then_lookup_every_key() {
    let index = HybridIndex::new(base_config()).unwrap();
    let entries: Vec<(u64, u64)> = (0..10_000u64).map(|i| (i * 5, i + 1)).collect();

    let elapsed = index.build(entries.clone(), 1);
    assert!(elapsed.as_nanos() > 0);
    assert_eq!(index.size(), 10_000);

    for (k, v) in &entries {
        assert_eq!(index.point_lookup(*k), Some(*v), "key {} must resolve", k);
    }
    assert_eq!(index.point_lookup(1), None);
    assert_eq!(index.point_lookup(u64::MAX), None);
}

#[test]
fn test_insert_same_key_twice_keeps_last_value() {
    let index = HybridIndex::new(base_config()).unwrap();
    index.insert(9, 1);
    index.insert(9, 2);
    assert_eq!(index.point_lookup(9), Some(2));

    // The key is hot by now and routed to the read tier; further overwrites
    // must stay idempotent.
    for v in 3..20u64 {
        index.insert(9, v);
        assert_eq!(index.point_lookup(9), Some(v));
    }
}

#[test]
fn test_prewarm_build_policy() {
    let config = EmberConfig {
        prewarm_limit: 100,
        ..EmberConfig::default()
    };
    let index = HybridIndex::new(config).unwrap();
    index.build((0..1000u64).map(|i| (i, i)).collect(), 1);

    let stats = index.stats();
    assert_eq!(stats.dpi_entries, 1000);
    assert_eq!(stats.lit_entries, 100);

    // Middle of the key space is read-tier resident; edges fall back.
    assert_eq!(index.point_lookup(500), Some(500));
    assert_eq!(index.point_lookup(0), Some(0));
    assert_eq!(index.point_lookup(999), Some(999));

    // An update of a pre-warmed key must win over the stale write-tier copy.
    index.insert(500, 12345);
    assert_eq!(index.point_lookup(500), Some(12345));
    assert_eq!(index.range_query(500, 500), 12345);
}

#[test]
fn test_full_lit_build_policy() {
    let config = EmberConfig {
        build_policy: BuildPolicy::FullLit,
        ..EmberConfig::default()
    };
    let index = HybridIndex::new(config).unwrap();
    index.build((0..500u64).map(|i| (i * 2, i)).collect(), 1);

    let stats = index.stats();
    assert_eq!(stats.dpi_entries, 0);
    assert_eq!(stats.lit_entries, 500);
    assert_eq!(index.point_lookup(400), Some(200));

    // New keys go to the write tier; updates of residents stay in the read
    // tier.
    index.insert(1001, 7);
    index.insert(400, 999);
    assert_eq!(index.point_lookup(1001), Some(7));
    assert_eq!(index.point_lookup(400), Some(999));
    assert_eq!(index.range_query(1000, 1002), 7);
}

#[test]
fn test_rebuild_replaces_contents() {
    let index = HybridIndex::new(base_config()).unwrap();
    index.build(vec![(1, 1), (2, 2)], 1);
    assert_eq!(index.point_lookup(1), Some(1));

    index.build(vec![(10, 10), (20, 20)], 1);
    assert_eq!(index.point_lookup(1), None);
    assert_eq!(index.point_lookup(10), Some(10));
    assert_eq!(index.size(), 2);
    assert_eq!(index.hot_key_count(), 0, "rebuild clears the hot set");
    assert_eq!(index.queue_depth(), 0, "rebuild clears the migration queue");
}

#[test]
fn test_range_query_spanning_both_tiers() {
    let index = HybridIndex::new(base_config()).unwrap();
    index.build((1..=100u64).map(|i| (i, i)).collect(), 1);

    assert_eq!(index.range_query(1, 100), (1..=100u64).sum::<u64>());
    assert_eq!(index.range_query(10, 20), (10..=20u64).sum::<u64>());
    assert_eq!(index.range_query(101, 1000), 0);
    assert_eq!(index.range_query(50, 50), 50);

    // Insert a fresh key into the write tier and a hot overwrite, then
    // re-check the sum.
    index.insert(200, 1000);
    assert_eq!(index.range_query(1, 200), (1..=100u64).sum::<u64>() + 1000);
}

#[test]
fn test_benchmark_metadata() {
    let index = HybridIndex::new(EmberConfig::default()).unwrap();
    assert_eq!(index.name(), "ember_hybrid");
    assert_eq!(index.variant(), "64");
    assert_eq!(index.search_kernel(), "binary");
    assert!(index.applicable(true, true, true, false, "osmc_100M"));
    assert!(!index.applicable(true, false, false, true, "osmc_100M"));
}

#[test]
fn test_metrics_render_smoke() {
    let index = HybridIndex::new(base_config()).unwrap();
    index.build(vec![(1, 1)], 1);
    index.point_lookup(1);
    let rendered = emberdb_engine::metrics::render();
    assert!(rendered.contains("emberdb_lookups_total"));
}
