//! Retry logic with exponential backoff and a circuit breaker
//!
//! This module provides:
//! - Error classification hook (`RetryClassifiable`)
//! - Exponential backoff with injectable jitter
//! - Max retry limits (3 retries default)
//! - A trailing-window circuit breaker, owned or shared
//! - Cancellation support via `CancellationToken`
//! - Progress events for the UI instead of callbacks

pub mod circuit_breaker;
pub mod classifier;
pub mod engine;
pub mod events;
pub mod state;
pub mod strategy;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, SharedCircuitBreaker,
};
pub use classifier::RetryClassifiable;
pub use engine::{RetryCondition, RetryEngine};
pub use events::{FnObserver, RetryEvent, RetryObserver};
pub use state::{FailureRecord, RetryState};
pub use strategy::{FixedJitter, JitterSource, NoJitter, RandomJitter, RetryPolicy};

use std::time::Duration;

use crate::taxonomy::ErrorInfo;

/// Outcome of a retried operation that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The breaker is open; the operation was not attempted.
    #[error("Service temporarily unavailable, retry in {}s", retry_after.as_secs().max(1))]
    CircuitOpen { retry_after: Duration },

    /// External cancellation requested.
    #[error("Retry aborted by cancellation")]
    Aborted,

    /// The operation's own error, after exhaustion or a non-retryable failure.
    #[error("Operation failed after {attempts} attempt(s): {source}")]
    Failed {
        attempts: u32,
        info: ErrorInfo,
        #[source]
        source: E,
    },
}

impl<E> RetryError<E> {
    /// `circuit_open`, `aborted`, or the failure's category code.
    pub fn code(&self) -> &'static str {
        match self {
            RetryError::CircuitOpen { .. } => "circuit_open",
            RetryError::Aborted => "aborted",
            RetryError::Failed { info, .. } => info.category.as_str(),
        }
    }

    pub fn info(&self) -> Option<&ErrorInfo> {
        match self {
            RetryError::Failed { info, .. } => Some(info),
            RetryError::CircuitOpen { .. } | RetryError::Aborted => None,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, RetryError::CircuitOpen { .. })
    }

    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Failed { source, .. } => Some(source),
            RetryError::CircuitOpen { .. } | RetryError::Aborted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{ErrorInfo, RawError};
    use pretty_assertions::assert_eq;
    use std::error::Error as _;

    #[test]
    fn messages_and_source_chain() {
        let open: RetryError<RawError> = RetryError::CircuitOpen {
            retry_after: Duration::from_millis(300),
        };
        assert_eq!(open.to_string(), "Service temporarily unavailable, retry in 1s");
        assert!(open.source().is_none());

        let raw = RawError::http(503, "busy");
        let failed = RetryError::Failed {
            attempts: 4,
            info: ErrorInfo::from_raw(&raw),
            source: raw,
        };
        assert_eq!(failed.to_string(), "Operation failed after 4 attempt(s): HTTP 503: busy");
        assert_eq!(
            failed.source().map(ToString::to_string).as_deref(),
            Some("HTTP 503: busy")
        );
        assert_eq!(failed.code(), "server_error");
    }

    #[test]
    fn raw_error_display() {
        assert_eq!(RawError::http(404, "").to_string(), "HTTP 404");
        assert_eq!(RawError::transport("connection reset").to_string(), "connection reset");
    }
}
