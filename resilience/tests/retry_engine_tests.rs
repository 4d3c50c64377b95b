//! End-to-end behaviour of the retry engine against scripted operations.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use storefront_resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, ErrorCategory, NoJitter, RandomJitter,
    RawError, RetryEngine, RetryError, RetryEvent, RetryPolicy,
};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::time::Instant;

fn policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(1000),
        exponential_backoff: true,
        jitter_factor: 0.1,
    }
}

fn drain(rx: &mut UnboundedReceiver<RetryEvent>) -> Vec<RetryEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Operation that fails with `status` until call number `succeed_on`.
fn flaky(
    calls: Arc<AtomicU32>,
    status: u16,
    succeed_on: u32,
) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<u32, RawError>> + Send>> {
    move || {
        let calls = calls.clone();
        Box::pin(async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= succeed_on {
                Ok(n)
            } else {
                Err(RawError::http(status, format!("attempt {n}")))
            }
        })
    }
}

#[tokio::test(start_paused = true)]
async fn retryable_failures_then_success() {
    let calls = Arc::new(AtomicU32::new(0));
    let (tx, mut rx) = unbounded_channel();
    let mut engine = RetryEngine::new(policy(3))
        .with_jitter(NoJitter)
        .with_observer(tx);

    let started = Instant::now();
    let result = engine.execute(flaky(calls.clone(), 503, 3)).await;

    assert_eq!(result.ok(), Some(3));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= Duration::from_millis(300));

    let events = drain(&mut rx);
    let scheduled = events
        .iter()
        .filter(|e| matches!(e, RetryEvent::RetryScheduled { .. }))
        .count();
    assert_eq!(scheduled, 2);
    assert_eq!(events.last(), Some(&RetryEvent::Succeeded { attempts: 3 }));
}

#[tokio::test(start_paused = true)]
async fn exhaustion_surfaces_last_error_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let (tx, mut rx) = unbounded_channel();
    let mut engine = RetryEngine::new(policy(3))
        .with_jitter(NoJitter)
        .with_observer(tx);

    let result = engine.execute(flaky(calls.clone(), 502, u32::MAX)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    match result {
        Err(RetryError::Failed {
            attempts,
            info,
            source,
        }) => {
            assert_eq!(attempts, 4);
            assert_eq!(info.category, ErrorCategory::ServerError);
            assert_eq!(source.message, "attempt 4");
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    let gave_up = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, RetryEvent::GaveUp { .. }))
        .count();
    assert_eq!(gave_up, 1);
}

#[tokio::test(start_paused = true)]
async fn non_retryable_error_is_attempted_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut engine = RetryEngine::new(policy(3)).with_jitter(NoJitter);

    let result = engine.execute(flaky(calls.clone(), 403, u32::MAX)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        result.err().map(|e| e.code()),
        Some(ErrorCategory::PermissionDenied.as_str())
    );
}

#[tokio::test(start_paused = true)]
async fn breaker_opens_after_five_failures_and_recovers() {
    let calls = Arc::new(AtomicU32::new(0));
    let (tx, mut rx) = unbounded_channel();
    let mut engine = RetryEngine::new(policy(3))
        .with_jitter(NoJitter)
        .with_observer(tx);

    // Four failures in the first call, the fifth in the second.
    assert!(engine.execute(flaky(calls.clone(), 500, u32::MAX)).await.is_err());
    assert_eq!(engine.circuit_state(), CircuitState::Closed);
    assert!(engine.execute(flaky(calls.clone(), 500, u32::MAX)).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(engine.circuit_state(), CircuitState::Open);
    assert!(engine.state().circuit_open_until.is_some());

    let rejected = engine.execute(flaky(calls.clone(), 500, 1)).await;
    assert!(matches!(rejected, Err(RetryError::CircuitOpen { .. })));
    assert_eq!(rejected.err().map(|e| e.code()), Some("circuit_open"));
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    let opened = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, RetryEvent::CircuitOpened { .. }))
        .count();
    assert_eq!(opened, 1);

    tokio::time::advance(Duration::from_secs(60)).await;

    let recovered = engine.execute(flaky(calls.clone(), 500, 1)).await;
    assert_eq!(recovered.ok(), Some(6));
    let breaker = engine.breaker();
    let failures = breaker
        .lock()
        .map(|b| b.consecutive_failures())
        .unwrap_or(u32::MAX);
    assert_eq!(failures, 0);
}

#[tokio::test(start_paused = true)]
async fn shared_breaker_rejects_for_every_engine() {
    let breaker = CircuitBreaker::shared(CircuitBreakerConfig {
        failure_threshold: 2,
        ..Default::default()
    });
    let calls = Arc::new(AtomicU32::new(0));
    let mut checkout = RetryEngine::new(policy(0)).with_shared_breaker(breaker.clone());
    let mut cart = RetryEngine::new(policy(0)).with_shared_breaker(breaker);

    assert!(checkout.execute(flaky(calls.clone(), 503, u32::MAX)).await.is_err());
    assert!(cart.execute(flaky(calls.clone(), 503, u32::MAX)).await.is_err());

    let result = checkout.execute(flaky(calls.clone(), 503, 1)).await;
    assert!(result.is_err_and(|e| e.is_circuit_open()));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn breaker_opened_elsewhere_stops_pending_retries() {
    let breaker = CircuitBreaker::shared(CircuitBreakerConfig {
        failure_threshold: 2,
        ..Default::default()
    });
    let slow_policy = RetryPolicy {
        max_retries: 3,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(1),
        exponential_backoff: false,
        jitter_factor: 0.0,
    };
    let checkout_calls = Arc::new(AtomicU32::new(0));
    let cart_calls = Arc::new(AtomicU32::new(0));
    let (tx, mut rx) = unbounded_channel();
    let mut checkout = RetryEngine::new(slow_policy)
        .with_shared_breaker(breaker.clone())
        .with_jitter(NoJitter)
        .with_observer(tx);
    let mut cart = RetryEngine::new(policy(0)).with_shared_breaker(breaker);

    let (checkout_result, cart_result) = tokio::join!(
        checkout.execute(flaky(checkout_calls.clone(), 503, u32::MAX)),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cart.execute(flaky(cart_calls.clone(), 503, u32::MAX)).await
        }
    );

    assert!(matches!(cart_result, Err(RetryError::Failed { attempts: 1, .. })));
    assert!(
        matches!(checkout_result, Err(RetryError::CircuitOpen { .. })),
        "{checkout_result:?}"
    );
    assert_eq!(checkout_calls.load(Ordering::SeqCst), 1);
    assert_eq!(cart_calls.load(Ordering::SeqCst), 1);
    assert!(!checkout.state().is_retrying);
    assert!(matches!(
        drain(&mut rx).last(),
        Some(RetryEvent::CircuitRejected { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn backoff_is_non_decreasing_and_capped() {
    let calls = Arc::new(AtomicU32::new(0));
    let (tx, mut rx) = unbounded_channel();
    let max_retries = 6;
    let mut engine = RetryEngine::new(policy(max_retries))
        .with_breaker_config(CircuitBreakerConfig {
            failure_threshold: 100,
            ..Default::default()
        })
        .with_jitter(RandomJitter::seeded(42))
        .with_observer(tx);

    let _ = engine.execute(flaky(calls.clone(), 504, u32::MAX)).await;

    let delays: Vec<Duration> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            RetryEvent::RetryScheduled { delay, .. } => Some(delay),
            _ => None,
        })
        .collect();

    assert_eq!(delays.len(), max_retries as usize);
    assert!(delays.windows(2).all(|w| w[0] <= w[1]), "{delays:?}");
    assert!(delays.iter().all(|d| *d <= Duration::from_millis(1000)));
    assert_eq!(delays.last(), Some(&Duration::from_millis(1000)));
}

#[tokio::test(start_paused = true)]
async fn expired_session_is_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let mut engine = RetryEngine::new(policy(2)).with_jitter(NoJitter);

    let result = engine
        .execute(move || {
            let calls = calls_clone.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(RawError::http(401, "Token expired"))
                } else {
                    Ok(())
                }
            }
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
