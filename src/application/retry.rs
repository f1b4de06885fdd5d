//! Bounded retry with exponential backoff and jitter
//!
//! Only transient venue errors (`ExchangeError::is_transient`) are retried.
//! Every other error returns immediately; running out of attempts returns
//! `ExecutionError::RetriesExhausted` with the last error attached.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ports::exchange::ExchangeError;
use super::executor::ExecutionError;
use super::shutdown::Shutdown;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    #[serde(with = "millis")]
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Extra random delay as a fraction of the backoff (0.1 = up to +10%)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt` (1-based), without jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let nanos = (self.initial_delay.as_nanos() as f64 * self.backoff_factor.powi(exponent)).round();
        if !nanos.is_finite() || nanos < 0.0 || nanos >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(nanos as u64)
    }

    fn with_jitter(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(0.0..=self.jitter);
        delay + delay.mul_f64(factor)
    }

    /// Run `attempt_fn` until it succeeds, fails permanently, or attempts run
    /// out. Shutdown is checked before every attempt and interrupts backoff.
    pub async fn retry<T, F, Fut>(
        &self,
        operation: &'static str,
        shutdown: &mut Shutdown,
        mut attempt_fn: F,
    ) -> Result<T, ExecutionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ExchangeError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if shutdown.is_triggered() {
                return Err(ExecutionError::Cancelled);
            }
            attempt += 1;

            let error = match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_transient() {
                return Err(ExecutionError::Exchange(error));
            }
            if attempt >= max_attempts {
                return Err(ExecutionError::RetriesExhausted {
                    operation,
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.with_jitter(self.delay_for(attempt));
            warn!(
                "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                operation, attempt, max_attempts, error, delay
            );

            tokio::select! {
                _ = shutdown.triggered() => return Err(ExecutionError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
