//! Circuit breaker for cascading failure prevention
//!
//! Counts failures inside a trailing window. Once the count reaches the
//! threshold the breaker opens for a fixed duration and every call is
//! refused; when that duration elapses the count starts again from zero.
//! Time is passed in explicitly so the state machine can be driven by tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

/// Breaker shared between several engines.
pub type SharedCircuitBreaker = Arc<Mutex<CircuitBreaker>>;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed, // Normal operation
    Open,   // Threshold exceeded, fast-fail
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    /// A gap longer than this between failures resets the count.
    pub failure_window: Duration,
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            open_duration: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    open_until: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
            last_failure_at: None,
            open_until: None,
        }
    }

    pub fn shared(config: CircuitBreakerConfig) -> SharedCircuitBreaker {
        Arc::new(Mutex::new(Self::new(config)))
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn open_until(&self) -> Option<Instant> {
        self.open_until
    }

    pub fn state_at(&self, now: Instant) -> CircuitState {
        match self.open_until {
            Some(until) if now < until => CircuitState::Open,
            _ => CircuitState::Closed,
        }
    }

    /// Check whether a call may proceed.
    ///
    /// Returns the remaining open time when refused. An expired open window
    /// is cleared here, resetting the failure count.
    pub fn try_acquire_at(&mut self, now: Instant) -> Result<(), Duration> {
        match self.open_until {
            Some(until) if now < until => Err(until - now),
            Some(_) => {
                tracing::debug!("circuit breaker cooldown elapsed, closing");
                self.reset();
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Record a failure. Returns `true` when this failure opened the breaker.
    pub fn record_failure_at(&mut self, now: Instant) -> bool {
        if self.open_until.is_some_and(|until| now >= until) {
            self.reset();
        }
        if let Some(last) = self.last_failure_at
            && now.saturating_duration_since(last) > self.config.failure_window
        {
            self.consecutive_failures = 0;
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(now);

        if self.open_until.is_none() && self.consecutive_failures >= self.config.failure_threshold
        {
            let until = now + self.config.open_duration;
            self.open_until = Some(until);
            tracing::warn!(
                failures = self.consecutive_failures,
                open_secs = self.config.open_duration.as_secs(),
                "circuit breaker opened"
            );
            return true;
        }
        false
    }

    pub fn record_success(&mut self) {
        self.reset();
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.last_failure_at = None;
        self.open_until = None;
    }

    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.try_acquire_at(Instant::now())
    }

    pub fn record_failure(&mut self) -> bool {
        self.record_failure_at(Instant::now())
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn opens_after_threshold_within_window() {
        let start = Instant::now();
        let mut breaker = CircuitBreaker::default();

        for i in 0..4 {
            assert!(!breaker.record_failure_at(start + secs(i)));
        }
        assert_eq!(breaker.state_at(start + secs(4)), CircuitState::Closed);

        assert!(breaker.record_failure_at(start + secs(4)));
        assert_eq!(breaker.state_at(start + secs(5)), CircuitState::Open);
        assert_eq!(breaker.try_acquire_at(start + secs(34)), Err(secs(30)));
    }

    #[test]
    fn slow_failures_decay() {
        let start = Instant::now();
        let mut breaker = CircuitBreaker::default();

        for i in 0..4 {
            breaker.record_failure_at(start + secs(i));
        }
        // 61s gap: the count starts over.
        assert!(!breaker.record_failure_at(start + secs(64)));
        assert_eq!(breaker.consecutive_failures(), 1);
    }

    #[test]
    fn closes_and_resets_after_open_window() {
        let start = Instant::now();
        let mut breaker = CircuitBreaker::default();
        for _ in 0..5 {
            breaker.record_failure_at(start);
        }
        assert!(breaker.try_acquire_at(start + secs(59)).is_err());

        assert_eq!(breaker.try_acquire_at(start + secs(60)), Ok(()));
        assert_eq!(breaker.consecutive_failures(), 0);
        assert_eq!(breaker.state_at(start + secs(60)), CircuitState::Closed);
    }

    #[test]
    fn success_fully_resets() {
        let start = Instant::now();
        let mut breaker = CircuitBreaker::default();
        for i in 0..3 {
            breaker.record_failure_at(start + secs(i));
        }
        breaker.record_success();
        assert_eq!(breaker.consecutive_failures(), 0);
        assert_eq!(breaker.open_until(), None);
    }

    #[test]
    fn reopens_when_failures_follow_an_elapsed_window() {
        let start = Instant::now();
        let mut breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        });
        breaker.record_failure_at(start);
        assert!(breaker.record_failure_at(start));

        // Nobody called try_acquire after the window elapsed.
        let later = start + secs(90);
        assert!(!breaker.record_failure_at(later));
        assert_eq!(breaker.consecutive_failures(), 1);
        assert!(breaker.record_failure_at(later + secs(1)));
        assert_eq!(breaker.state_at(later + secs(2)), CircuitState::Open);
    }

    #[test]
    fn custom_threshold() {
        let start = Instant::now();
        let mut breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        });
        assert!(!breaker.record_failure_at(start));
        assert!(breaker.record_failure_at(start));
    }
}
