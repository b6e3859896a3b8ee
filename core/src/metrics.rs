//! Metric names emitted by the traffic-shaping components.
//!
//! Components record through the `metrics` facade; nothing is exported
//! unless the embedding application installs a recorder (the web crate
//! ships a Prometheus one). Call [`describe_metrics`] once after installing
//! the recorder so scrapes carry help text.

use ::metrics::describe_counter;

/// Lock records created by the idempotency gate.
pub const GATE_ACQUIRED: &str = "idempotency_gate_acquired_total";
/// Requests rejected as duplicates (including fail-closed rejections).
pub const GATE_REJECTED: &str = "idempotency_gate_rejected_total";
/// Store failures seen by the idempotency gate.
pub const GATE_STORE_ERRORS: &str = "idempotency_gate_store_errors_total";

/// Cache reads answered from the store.
pub const CACHE_HITS: &str = "cache_hits_total";
/// Cache reads that fell through to the durable store.
pub const CACHE_MISSES: &str = "cache_misses_total";
/// Cached entries that could not be decoded.
pub const CACHE_DECODE_ERRORS: &str = "cache_decode_errors_total";
/// Cache writes skipped because of encoding or store failures.
pub const CACHE_WRITE_ERRORS: &str = "cache_write_errors_total";

/// Successful view counter increments.
pub const VIEW_INCREMENTS: &str = "view_counter_increments_total";
/// View counter increments dropped because of store failures.
pub const VIEW_ERRORS: &str = "view_counter_errors_total";

/// Register descriptions for every metric above.
pub fn describe_metrics() {
    describe_counter!(GATE_ACQUIRED, "Total number of idempotency locks acquired");
    describe_counter!(
        GATE_REJECTED,
        "Total number of mutating requests rejected as duplicates"
    );
    describe_counter!(
        GATE_STORE_ERRORS,
        "Total number of shared store failures seen by the idempotency gate"
    );

    describe_counter!(CACHE_HITS, "Total number of cache hits");
    describe_counter!(CACHE_MISSES, "Total number of cache misses");
    describe_counter!(
        CACHE_DECODE_ERRORS,
        "Total number of cached entries discarded as undecodable"
    );
    describe_counter!(CACHE_WRITE_ERRORS, "Total number of skipped cache writes");

    describe_counter!(VIEW_INCREMENTS, "Total number of recorded product views");
    describe_counter!(VIEW_ERRORS, "Total number of dropped product views");
}
