//! Prometheus metrics for mdtiler
//!
//! Covers the dataset cache (operations, size) and authoritative opens.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, IntCounterVec, IntGauge, TextEncoder, register_int_counter_vec, register_int_gauge,
};

lazy_static! {
    /// Cache store operations by type (get, put, evict) and outcome
    pub static ref CACHE_OPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "mdtiler_cache_operations_total",
        "Total number of cache store operations by type and outcome",
        &["operation", "status"]
    )
    .unwrap();

    /// Bytes currently held by the cache store
    pub static ref CACHE_BYTES: IntGauge = register_int_gauge!(
        "mdtiler_cache_bytes",
        "Cumulative payload bytes currently stored in the dataset cache"
    )
    .unwrap();

    /// Entries currently held by the cache store
    pub static ref CACHE_ENTRIES: IntGauge = register_int_gauge!(
        "mdtiler_cache_entries",
        "Number of entries currently stored in the dataset cache"
    )
    .unwrap();

    /// Dataset opens by origin (cache or source)
    pub static ref DATASET_OPENS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "mdtiler_dataset_opens_total",
        "Total number of dataset opens by origin",
        &["source"]
    )
    .unwrap();
}

/// Encode all registered metrics in the Prometheus text format
pub fn encode_metrics() -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).to_string())
}

/// Initialize metrics with default values
pub fn init_metrics() {
    let _ = &*CACHE_OPS_TOTAL;
    let _ = &*CACHE_BYTES;
    let _ = &*CACHE_ENTRIES;
    let _ = &*DATASET_OPENS_TOTAL;
}
