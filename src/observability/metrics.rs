//! Metrics registry for ClassSense
//!
//! - Counters only
//! - Monotonic increase, reset only on process start
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::class_store::StoreError;

/// Operational counters for the class API
///
/// All counters use Relaxed ordering; readers only need eventual values.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Classes successfully created
    classes_created: AtomicU64,
    /// Sensor readings stored
    sensor_updates: AtomicU64,
    /// Emotion entries recorded
    emotions_recorded: AtomicU64,
    /// State reads served
    state_reads: AtomicU64,
    /// Requests naming a class that does not exist
    class_not_found: AtomicU64,
    /// Creations that ran out of code attempts
    code_space_exhausted: AtomicU64,
    /// Backend failures surfaced to callers
    backend_failures: AtomicU64,
    /// Requests rejected before reaching the store
    rejected_requests: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_classes_created(&self) {
        self.classes_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_sensor_updates(&self) {
        self.sensor_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_emotions_recorded(&self) {
        self.emotions_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_state_reads(&self) {
        self.state_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected_requests(&self) {
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a store failure under its kind
    pub fn record_store_error(&self, error: &StoreError) {
        let counter = match error {
            StoreError::ClassNotFound(_) => &self.class_not_found,
            StoreError::CodeSpaceExhausted { .. } => &self.code_space_exhausted,
            StoreError::Backend(_) => &self.backend_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            classes_created: self.classes_created.load(Ordering::Relaxed),
            sensor_updates: self.sensor_updates.load(Ordering::Relaxed),
            emotions_recorded: self.emotions_recorded.load(Ordering::Relaxed),
            state_reads: self.state_reads.load(Ordering::Relaxed),
            class_not_found: self.class_not_found.load(Ordering::Relaxed),
            code_space_exhausted: self.code_space_exhausted.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
        }
    }

    /// Current snapshot as a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or_default()
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub classes_created: u64,
    pub sensor_updates: u64,
    pub emotions_recorded: u64,
    pub state_reads: u64,
    pub class_not_found: u64,
    pub code_space_exhausted: u64,
    pub backend_failures: u64,
    pub rejected_requests: u64,
}
