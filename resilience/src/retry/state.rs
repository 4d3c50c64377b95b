use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::taxonomy::ErrorInfo;

/// Failures kept for the diagnostic view.
pub const FAILURE_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub error: ErrorInfo,
    pub at: DateTime<Utc>,
}

/// Per-engine retry bookkeeping. Lives as long as the engine; never persisted.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    pub attempt: u32,
    pub last_error: Option<ErrorInfo>,
    pub is_retrying: bool,
    pub circuit_open_until: Option<Instant>,
    failure_history: VecDeque<FailureRecord>,
}

impl RetryState {
    pub fn failure_history(&self) -> impl Iterator<Item = &FailureRecord> {
        self.failure_history.iter()
    }

    pub fn failure_count(&self) -> usize {
        self.failure_history.len()
    }

    pub(crate) fn record_failure(&mut self, error: ErrorInfo) {
        if self.failure_history.len() == FAILURE_HISTORY_LIMIT {
            self.failure_history.pop_front();
        }
        self.failure_history.push_back(FailureRecord {
            error: error.clone(),
            at: Utc::now(),
        });
        self.last_error = Some(error);
    }

    pub(crate) fn record_success(&mut self) {
        self.attempt = 0;
        self.is_retrying = false;
        self.last_error = None;
        self.circuit_open_until = None;
    }
}
