//! Client-side resilience for storefront API calls.
//!
//! Two halves:
//! - [`taxonomy`]: reduces any failure to a fixed [`ErrorCategory`] and
//!   produces the shopper/staff copy for it.
//! - [`retry`]: runs an async operation with bounded exponential backoff,
//!   a trailing-window circuit breaker, and cooperative cancellation.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod retry;
pub mod taxonomy;

pub use retry::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, FixedJitter, JitterSource, NoJitter,
    RandomJitter, RetryClassifiable, RetryEngine, RetryError, RetryEvent, RetryObserver,
    RetryPolicy, SharedCircuitBreaker,
};
pub use taxonomy::{
    Audience, ErrorCategory, ErrorInfo, MessageBundle, MessageContext, RawError, RawErrorKind,
    Severity, categorize, describe_error, get_message,
};
