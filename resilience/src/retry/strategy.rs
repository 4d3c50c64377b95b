//! Backoff strategy implementations
//!
//! Delay before retry `n` (1-based):
//! `min(initial_delay * 2^(n-1) * (1 + jitter), max_delay)`, where `jitter`
//! is drawn from `[0, jitter_factor)` by an injectable [`JitterSource`].
//! The un-jittered schedule comes from `backon`.

use std::time::Duration;

use backon::{BackoffBuilder, ConstantBuilder, ExponentialBuilder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (3 means up to 4 calls).
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Double the delay after each failure; constant delay when false.
    pub exponential_backoff: bool,
    /// Upper bound of the random extra delay, as a fraction of the base delay.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            exponential_backoff: true,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Base (un-jittered) delays, one per allowed retry.
    pub fn delay_schedule(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let times = self.max_retries as usize;
        if self.exponential_backoff {
            Box::new(
                ExponentialBuilder::default()
                    .with_min_delay(self.initial_delay)
                    .with_max_delay(self.max_delay)
                    .with_factor(2.0)
                    .with_max_times(times)
                    .build(),
            )
        } else {
            Box::new(
                ConstantBuilder::default()
                    .with_delay(self.initial_delay.min(self.max_delay))
                    .with_max_times(times)
                    .build(),
            )
        }
    }

    /// Apply jitter to a base delay and cap the result.
    ///
    /// `sample` is a uniform draw in `[0, 1)`.
    pub fn jittered(&self, base: Duration, sample: f64) -> Duration {
        let jitter = sample.clamp(0.0, 1.0) * self.jitter_factor.max(0.0);
        let nanos = (base.as_nanos() as f64 * (1.0 + jitter)).round();
        let capped = self.max_delay.as_nanos() as f64;
        Duration::from_nanos(nanos.min(capped) as u64)
    }

    /// Closed-form delay before retry `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32, sample: f64) -> Duration {
        let base = if self.exponential_backoff {
            let exponent = attempt.saturating_sub(1).min(31);
            self.initial_delay.saturating_mul(1_u32 << exponent)
        } else {
            self.initial_delay
        };
        self.jittered(base, sample)
    }
}

/// Source of jitter samples in `[0, 1)`.
pub trait JitterSource: Send {
    fn sample(&mut self) -> f64;
}

/// OS-seeded random jitter (the production default).
#[derive(Debug)]
pub struct RandomJitter {
    rng: StdRng,
}

impl RandomJitter {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic sequence, for reproducible timing tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomJitter {
    fn default() -> Self {
        Self::new()
    }
}

impl JitterSource for RandomJitter {
    fn sample(&mut self) -> f64 {
        self.rng.random_range(0.0..1.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn sample(&mut self) -> f64 {
        0.0
    }
}

/// Always returns the same sample.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&mut self) -> f64 {
        self.0
    }
}
