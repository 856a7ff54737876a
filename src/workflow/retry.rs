//! Bounded exponential backoff for model calls.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use tracing::debug;

use crate::error::{FlowError, ModelError};

/// Base delay before the first retry.
const INITIAL_INTERVAL_SECS: u64 = 1;
/// Ceiling for any single backoff delay.
const MAX_INTERVAL_SECS: u64 = 30;
const MULTIPLIER: f64 = 2.0;

/// Retry applies to model calls only; every other capability failure is
/// terminal on first occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// A policy making up to `max_attempts` total attempts (at least one).
    pub fn new(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `attempt` until it succeeds or the attempt bound is hit.
    ///
    /// On each failure the task sleeps for an exponentially increasing
    /// duration before the next attempt. Exhaustion wraps the last error
    /// in `FlowError::ModelCall` together with the attempt count.
    pub async fn run<T, Fut, F>(&self, mut attempt: F) -> Result<T, FlowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ModelError>>,
    {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_secs(INITIAL_INTERVAL_SECS),
            max_interval: Duration::from_secs(MAX_INTERVAL_SECS),
            multiplier: MULTIPLIER,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempts >= self.max_attempts {
                        return Err(FlowError::ModelCall {
                            attempts,
                            source: e,
                        });
                    }
                    debug!(attempt = attempts, error = %e, "model call failed, backing off");
                    if let Some(wait) = backoff.next_backoff() {
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }
    }
}
