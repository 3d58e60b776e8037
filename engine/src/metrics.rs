use once_cell::sync::Lazy;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_gauge, Encoder, Gauge,
    Histogram, IntCounter, IntGauge, TextEncoder,
};

pub static LOOKUPS_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| register_int_counter!("emberdb_lookups_total", "Total point lookups").unwrap());
pub static LIT_HITS_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| register_int_counter!("emberdb_lit_hits_total", "Lookups served by the read tier").unwrap());
pub static DPI_HITS_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| register_int_counter!("emberdb_dpi_hits_total", "Lookups served by the write tier").unwrap());
pub static LOOKUP_MISSES_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| register_int_counter!("emberdb_lookup_misses_total", "Lookups absent from both tiers").unwrap());
pub static INSERTS_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| register_int_counter!("emberdb_inserts_total", "Total inserts").unwrap());
pub static MIGRATIONS_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| register_int_counter!("emberdb_migrations_total", "Committed migration batches").unwrap());
pub static MIGRATION_ROLLBACKS_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| register_int_counter!("emberdb_migration_rollbacks_total", "Rolled back migration batches").unwrap());
pub static MIGRATED_KEYS_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| register_int_counter!("emberdb_migrated_keys_total", "Keys moved to the read tier").unwrap());
pub static STATS_AGED_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| register_int_counter!("emberdb_stats_aged_total", "Key-stats entries dropped by aging").unwrap());
pub static MIGRATION_DURATION_SECONDS: Lazy<Histogram> =
    Lazy::new(|| register_histogram!("emberdb_migration_duration_seconds", "Migration batch duration").unwrap());
pub static QUEUE_DEPTH: Lazy<IntGauge> =
    Lazy::new(|| register_int_gauge!("emberdb_queue_depth", "Keys pending migration").unwrap());
pub static KEY_STATS_ENTRIES: Lazy<IntGauge> =
    Lazy::new(|| register_int_gauge!("emberdb_key_stats_entries", "Tracked key-stats entries").unwrap());
pub static MIGRATION_THRESHOLD: Lazy<Gauge> =
    Lazy::new(|| register_gauge!("emberdb_migration_threshold", "Current migration size threshold").unwrap());

pub fn render() -> String {
    let mut buf = Vec::new();
    let encoder = TextEncoder::new();
    let mf = prometheus::gather();
    encoder.encode(&mf, &mut buf).unwrap();
    String::from_utf8_lossy(&buf).into_owned()
}
