//! Progress events emitted by the retry engine.
//!
//! The UI subscribes to these (toasts, "retrying…" banners) instead of
//! handing the engine a set of callbacks.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

use crate::taxonomy::ErrorInfo;

#[derive(Debug, Clone, PartialEq)]
pub enum RetryEvent {
    /// An attempt failed and another one is scheduled after `delay`.
    RetryScheduled {
        attempt: u32,
        error: ErrorInfo,
        delay: Duration,
    },

    /// The operation succeeded on attempt `attempts`.
    Succeeded { attempts: u32 },

    /// No further attempts will be made. Emitted once per failed call.
    GaveUp { attempts: u32, error: ErrorInfo },

    /// A failure pushed the breaker over its threshold.
    CircuitOpened { until: Instant },

    /// A call was refused without running the operation.
    CircuitRejected { retry_after: Duration },
}

pub trait RetryObserver: Send {
    fn on_event(&self, event: &RetryEvent);
}

/// Adapts a closure into an observer.
pub struct FnObserver<F>(pub F);

impl<F> RetryObserver for FnObserver<F>
where
    F: Fn(&RetryEvent) + Send,
{
    fn on_event(&self, event: &RetryEvent) {
        (self.0)(event)
    }
}

impl RetryObserver for UnboundedSender<RetryEvent> {
    fn on_event(&self, event: &RetryEvent) {
        // Receiver gone means nobody is listening anymore.
        let _ = self.send(event.clone());
    }
}
