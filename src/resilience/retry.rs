use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::config::DatabaseConfig;
use crate::context::{ExecutionContext, Interrupted};
use crate::metrics;

/// Growth factor between consecutive waits
pub const BACKOFF_MULTIPLIER: u32 = 2;

/// Failure of a retried operation
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed; carries the last failure
    #[error("Operation failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },

    /// The context finished while waiting between attempts
    #[error("Retry interrupted after {attempts} attempts: {reason}")]
    Interrupted {
        attempts: u32,
        reason: Interrupted,
        last: Option<E>,
    },
}

impl<E> RetryError<E> {
    /// The last failure returned by the operation, if any attempt ran
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Interrupted { last, .. } => last.as_ref(),
        }
    }

    pub fn into_last_error(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Interrupted { last, .. } => last,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Interrupted { attempts, .. } => *attempts,
        }
    }
}

/// Bounded exponential backoff
///
/// The wait after failed attempt `i` (zero-based) is
/// `min(base_wait * 2^i, max_wait)`. Holds no mutable state, so one instance
/// can be shared by any number of concurrent callers.
///
/// For `max_attempts = N` an always-failing operation runs exactly N times and
/// the cumulative wait lies between `base_wait * (2^(N-1) - 1)` (when no wait
/// is capped) and [`RetryPolicy::max_total_wait`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_wait: Duration,
    max_wait: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one
    pub fn new(max_attempts: u32, base_wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_wait,
            max_wait: Duration::MAX,
        }
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(config.max_retries, config.retry_wait()).with_max_wait(config.retry_max_wait())
    }

    /// Cap every single wait at `max_wait`
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait.max(self.base_wait);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_wait(&self) -> Duration {
        self.base_wait
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Wait following failed attempt `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = BACKOFF_MULTIPLIER.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_wait
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
            .min(self.max_wait)
    }

    /// Upper bound of the cumulative wait for an always-failing operation
    pub fn max_total_wait(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.delay_for(attempt))
            .fold(Duration::ZERO, |total, delay| total.saturating_add(delay))
    }

    /// Run `op` until it succeeds or every attempt is spent
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.execute_with(&ExecutionContext::background(), op).await
    }

    /// Like [`execute`](Self::execute), but stops waiting when `ctx` finishes
    ///
    /// A running attempt is not interrupted; the context is checked before
    /// each attempt and raced against each wait.
    pub async fn execute_with<F, Fut, T, E>(
        &self,
        ctx: &ExecutionContext,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut last = None;
        let mut attempt = 0;

        loop {
            if let Err(reason) = ctx.check() {
                return Err(RetryError::Interrupted {
                    attempts: attempt,
                    reason,
                    last,
                });
            }

            metrics::record_retry_attempt();

            let err = match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(attempts = attempt + 1, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            attempt += 1;

            if attempt >= self.max_attempts {
                tracing::error!(
                    attempts = attempt,
                    error = %err,
                    "Operation failed, retries exhausted"
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.delay_for(attempt - 1);
            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Operation failed, retrying"
            );
            last = Some(err);

            if let Err(reason) = ctx.sleep(delay).await {
                return Err(RetryError::Interrupted {
                    attempts: attempt,
                    reason,
                    last,
                });
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DatabaseConfig::default())
    }
}
