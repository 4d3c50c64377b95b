//! The retry engine: bounded retries, backoff, and a circuit breaker.
//!
//! Each call is sequential: attempt, classify, wait, attempt again. Nothing
//! is retried in parallel. The breaker is consulted before every attempt,
//! not only the first. An engine owns its breaker unless it was built
//! with [`RetryEngine::with_shared_breaker`].

use std::future::Future;
use std::sync::{MutexGuard, PoisonError};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, SharedCircuitBreaker,
};
use super::classifier::RetryClassifiable;
use super::events::{RetryEvent, RetryObserver};
use super::state::RetryState;
use super::strategy::{JitterSource, RandomJitter, RetryPolicy};
use super::RetryError;
use crate::taxonomy::{ErrorInfo, RawErrorKind};

/// Custom retry predicate: `(error, attempt) -> retry?`.
pub type RetryCondition = Box<dyn Fn(&ErrorInfo, u32) -> bool + Send + Sync>;

pub struct RetryEngine {
    policy: RetryPolicy,
    breaker: SharedCircuitBreaker,
    jitter: Box<dyn JitterSource>,
    condition: Option<RetryCondition>,
    observers: Vec<Box<dyn RetryObserver>>,
    state: RetryState,
}

impl RetryEngine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            breaker: CircuitBreaker::shared(CircuitBreakerConfig::default()),
            jitter: Box::new(RandomJitter::new()),
            condition: None,
            observers: Vec::new(),
            state: RetryState::default(),
        }
    }

    /// Give this engine its own breaker with the given thresholds.
    pub fn with_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = CircuitBreaker::shared(config);
        self
    }

    /// Share a breaker with other engines calling the same backend.
    pub fn with_shared_breaker(mut self, breaker: SharedCircuitBreaker) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_jitter(mut self, jitter: impl JitterSource + 'static) -> Self {
        self.jitter = Box::new(jitter);
        self
    }

    /// Replace the default `ErrorInfo::retryable` check.
    pub fn with_retry_condition(
        mut self,
        condition: impl Fn(&ErrorInfo, u32) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }

    pub fn with_observer(mut self, observer: impl RetryObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn state(&self) -> &RetryState {
        &self.state
    }

    pub fn breaker(&self) -> SharedCircuitBreaker {
        self.breaker.clone()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.lock_breaker().state_at(Instant::now())
    }

    /// Run `operation` with retries.
    pub async fn execute<F, Fut, T, E>(&mut self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryClassifiable + std::fmt::Display,
    {
        self.run(operation, None).await
    }

    /// Run `operation` with retries, stopping as soon as `cancel` fires.
    ///
    /// Cancellation, whether during an attempt or a backoff wait, returns
    /// [`RetryError::Aborted`] and is not counted by the breaker.
    pub async fn execute_cancellable<F, Fut, T, E>(
        &mut self,
        operation: F,
        cancel: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryClassifiable + std::fmt::Display,
    {
        self.run(operation, Some(cancel)).await
    }

    async fn run<F, Fut, T, E>(
        &mut self,
        mut operation: F,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryClassifiable + std::fmt::Display,
    {
        let mut schedule = self.policy.delay_schedule();
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(self.aborted());
            }

            // Another engine sharing the breaker may have opened it while we
            // were backing off.
            let acquired = self.lock_breaker().try_acquire_at(Instant::now());
            if let Err(retry_after) = acquired {
                self.state.is_retrying = false;
                tracing::debug!(
                    attempt,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "circuit open, refusing call"
                );
                self.emit(&RetryEvent::CircuitRejected { retry_after });
                return Err(RetryError::CircuitOpen { retry_after });
            }
            self.state.circuit_open_until = None;

            attempt = attempt.saturating_add(1);
            self.state.attempt = attempt;

            let output = match cancel {
                Some(token) => tokio::select! {
                    _ = token.cancelled() => return Err(self.aborted()),
                    output = operation() => output,
                },
                None => operation().await,
            };

            let err = match output {
                Ok(value) => {
                    self.lock_breaker().record_success();
                    self.state.record_success();
                    if attempt > 1 {
                        tracing::info!(attempts = attempt, "operation recovered after retry");
                    }
                    self.emit(&RetryEvent::Succeeded { attempts: attempt });
                    return Ok(value);
                }
                Err(err) => err,
            };

            if err.raw_error().kind == RawErrorKind::Aborted {
                return Err(self.aborted());
            }

            let info = err.classify();
            let now = Instant::now();
            let opened = self.lock_breaker().record_failure_at(now);
            self.state.record_failure(info.clone());
            if opened {
                let until = self.lock_breaker().open_until().unwrap_or(now);
                self.state.circuit_open_until = Some(until);
                self.emit(&RetryEvent::CircuitOpened { until });
            }

            let retry_allowed = !opened
                && attempt <= self.policy.max_retries
                && self.should_retry(&info, attempt);
            let next_delay = if retry_allowed { schedule.next() } else { None };

            let Some(base_delay) = next_delay else {
                self.state.is_retrying = false;
                tracing::warn!(
                    attempts = attempt,
                    category = %info.category,
                    retryable = info.retryable,
                    circuit_opened = opened,
                    "giving up: {err}"
                );
                self.emit(&RetryEvent::GaveUp {
                    attempts: attempt,
                    error: info.clone(),
                });
                return Err(RetryError::Failed {
                    attempts: attempt,
                    info,
                    source: err,
                });
            };

            let delay = self.policy.jittered(base_delay, self.jitter.sample());
            self.state.is_retrying = true;
            tracing::debug!(
                attempt,
                category = %info.category,
                delay_ms = delay.as_millis() as u64,
                "transient failure, retrying"
            );
            self.emit(&RetryEvent::RetryScheduled {
                attempt,
                error: info,
                delay,
            });

            match cancel {
                Some(token) => tokio::select! {
                    _ = token.cancelled() => return Err(self.aborted()),
                    _ = tokio::time::sleep(delay) => {}
                },
                None => tokio::time::sleep(delay).await,
            }
        }
    }

    fn should_retry(&self, info: &ErrorInfo, attempt: u32) -> bool {
        match &self.condition {
            Some(condition) => condition(info, attempt),
            None => info.retryable,
        }
    }

    fn aborted<E>(&mut self) -> RetryError<E> {
        self.state.is_retrying = false;
        tracing::debug!(attempt = self.state.attempt, "retry aborted");
        RetryError::Aborted
    }

    fn emit(&self, event: &RetryEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }

    fn lock_breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.breaker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RetryEngine {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{FnObserver, NoJitter};
    use crate::taxonomy::{ErrorCategory, RawError};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            exponential_backoff: true,
            jitter_factor: 0.1,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let mut engine = RetryEngine::new(fast_policy()).with_jitter(NoJitter);

        let result = engine
            .execute(move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, RawError>(42)
                }
            })
            .await;

        assert_eq!(result.ok(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.state().attempt, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_condition_overrides_default() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let mut engine = RetryEngine::new(fast_policy())
            .with_jitter(NoJitter)
            .with_retry_condition(|info, _| info.category == ErrorCategory::InvalidToken);

        let result = engine
            .execute(move || {
                let calls = calls_clone.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 2 {
                        Err(RawError::http(400, "token rotated"))
                    } else {
                        Ok("fresh")
                    }
                }
            })
            .await;

        assert_eq!(result.ok(), Some("fresh"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_operation_is_terminal_and_not_counted() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let mut engine = RetryEngine::new(fast_policy()).with_jitter(NoJitter);

        let result = engine
            .execute(move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(RawError::aborted())
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Aborted)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let breaker = engine.breaker();
        assert_eq!(
            breaker.lock().unwrap_or_else(PoisonError::into_inner).consecutive_failures(),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let cancel = CancellationToken::new();
        let cancel_from_observer = cancel.clone();
        let scheduled = Arc::new(AtomicU32::new(0));
        let scheduled_clone = scheduled.clone();
        let mut engine = RetryEngine::new(fast_policy())
            .with_jitter(NoJitter)
            .with_observer(FnObserver(move |event: &RetryEvent| {
                if matches!(event, RetryEvent::RetryScheduled { .. }) {
                    scheduled_clone.fetch_add(1, Ordering::SeqCst);
                    cancel_from_observer.cancel();
                }
            }));

        let result = engine
            .execute_cancellable(
                || async { Err::<(), _>(RawError::http(503, "busy")) },
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(RetryError::Aborted)));
        assert_eq!(scheduled.load(Ordering::SeqCst), 1);
        assert!(!engine.state().is_retrying);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let mut engine = RetryEngine::default();

        let result = engine
            .execute_cancellable(
                move || {
                    let calls = calls_clone.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, RawError>(1)
                    }
                },
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(RetryError::Aborted)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
