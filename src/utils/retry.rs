// src/utils/retry.rs

//! Explicit retry policy for network transfers.
//!
//! Only errors classified as transient by [`AppError::is_transient`] are
//! retried. Anything else, and the final transient failure, propagates.

use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Exponential backoff with a per-wait cap.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Wait after the first failure
    pub initial_delay: Duration,
    /// Upper bound for any single wait
    pub max_delay: Duration,
    /// Growth factor between waits
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(15),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits, for tests and local backends.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::immediate(1)
    }

    /// Wait before attempt `attempt + 1`, where `attempt` (1-based) just failed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let secs = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Every wait this policy would perform if all attempts failed.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts)
            .map(|attempt| self.delay_for_attempt(attempt))
            .collect()
    }
}

/// Run `op` until it succeeds, fails permanently, or exhausts the policy.
///
/// Exhaustion yields [`AppError::TransferFailed`] wrapping the last error.
/// Dropping the returned future stops retrying.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) if attempt >= max_attempts => {
                log::error!("{} failed after {} attempts: {}", operation, attempt, err);
                return Err(AppError::TransferFailed {
                    operation: operation.to_string(),
                    attempts: attempt,
                    source: Box::new(err),
                });
            }
            Err(err) => {
                let delay = policy.delay_for_attempt(attempt);
                log::warn!(
                    "{} attempt {}/{} failed: {}; retrying in {:?}",
                    operation,
                    attempt,
                    max_attempts,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
