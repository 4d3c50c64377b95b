//! Structured validation results and the counters that track them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Pass/fail with the reasons an item was rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    reasons: Vec<String>,
}

impl Validation {
    pub fn pass() -> Self {
        Self::default()
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            reasons: vec![reason.into()],
        }
    }

    /// Record `reason` unless `ok` holds. Chainable.
    pub fn check(mut self, ok: bool, reason: impl Into<String>) -> Self {
        if !ok {
            self.reasons.push(reason.into());
        }
        self
    }

    pub fn merge(mut self, other: Validation) -> Self {
        self.reasons.extend(other.reasons);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    pub fn into_reasons(self) -> Vec<String> {
        self.reasons
    }
}

/// Validation and cleanup counters shared by every collection of a store.
#[derive(Debug, Default)]
pub struct ValidationMonitor {
    items_checked: AtomicU64,
    items_rejected: AtomicU64,
    cleanup_runs: AtomicU64,
    cleanup_micros: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationStats {
    pub items_checked: u64,
    pub items_rejected: u64,
    pub cleanup_runs: u64,
    pub cleanup_micros: u64,
}

impl ValidationMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_check(&self, validation: &Validation) {
        self.items_checked.fetch_add(1, Ordering::Relaxed);
        if !validation.is_valid() {
            self.items_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_cleanup(&self, elapsed: Duration) {
        self.cleanup_runs.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.cleanup_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ValidationStats {
        ValidationStats {
            items_checked: self.items_checked.load(Ordering::Relaxed),
            items_rejected: self.items_rejected.load(Ordering::Relaxed),
            cleanup_runs: self.cleanup_runs.load(Ordering::Relaxed),
            cleanup_micros: self.cleanup_micros.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.items_checked.store(0, Ordering::Relaxed);
        self.items_rejected.store(0, Ordering::Relaxed);
        self.cleanup_runs.store(0, Ordering::Relaxed);
        self.cleanup_micros.store(0, Ordering::Relaxed);
    }
}
