//! Search metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Reset only on process start

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for a search run.
///
/// Uses Relaxed ordering; counters are independent and exact once the
/// incrementing threads have been joined.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Digests computed
    hashes_mined: AtomicU64,
    /// Rare digests found
    rare_found: AtomicU64,
    /// Batches mined
    batches_mined: AtomicU64,
    /// Records durably stored
    records_stored: AtomicU64,
    /// Cursor writes
    cursor_flushes: AtomicU64,
    /// Backend fallbacks
    backend_fallbacks: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a mined batch of `items` digests, `rare` of them rare
    pub fn record_batch(&self, items: u64, rare: u64) {
        self.batches_mined.fetch_add(1, Ordering::Relaxed);
        self.hashes_mined.fetch_add(items, Ordering::Relaxed);
        self.rare_found.fetch_add(rare, Ordering::Relaxed);
    }

    pub fn add_records_stored(&self, count: u64) {
        self.records_stored.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_cursor_flushes(&self) {
        self.cursor_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_backend_fallbacks(&self) {
        self.backend_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hashes_mined(&self) -> u64 {
        self.hashes_mined.load(Ordering::Relaxed)
    }

    pub fn rare_found(&self) -> u64 {
        self.rare_found.load(Ordering::Relaxed)
    }

    /// Point-in-time snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hashes_mined: self.hashes_mined.load(Ordering::Relaxed),
            rare_found: self.rare_found.load(Ordering::Relaxed),
            batches_mined: self.batches_mined.load(Ordering::Relaxed),
            records_stored: self.records_stored.load(Ordering::Relaxed),
            cursor_flushes: self.cursor_flushes.load(Ordering::Relaxed),
            backend_fallbacks: self.backend_fallbacks.load(Ordering::Relaxed),
        }
    }

    /// Snapshot as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or(serde_json::Value::Null)
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub hashes_mined: u64,
    pub rare_found: u64,
    pub batches_mined: u64,
    pub records_stored: u64,
    pub cursor_flushes: u64,
    pub backend_fallbacks: u64,
}
