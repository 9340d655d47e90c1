//! Retry policy for parse attempts

use crate::errors::{IngestionError, RETRYABLE_KINDS};
use backoff::backoff::{Backoff, Constant};
use backoff::ExponentialBackoffBuilder;
use mindpub_common::config::{BackoffKind, IngestionConfig};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How many times to attempt an operation and how long to wait in between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait before the second attempt
    pub delay: Duration,
    pub backoff: BackoffKind,
    /// Error kinds (see [`IngestionError::kind`]) worth another attempt
    pub retryable_kinds: Vec<&'static str>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            backoff: BackoffKind::Fixed,
            retryable_kinds: RETRYABLE_KINDS.to_vec(),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &IngestionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: config.retry_delay(),
            backoff: config.retry_backoff,
            ..Self::default()
        }
    }

    pub fn should_retry(&self, error: &IngestionError) -> bool {
        self.retryable_kinds.contains(&error.kind())
    }

    fn delays(&self) -> Box<dyn Backoff + Send> {
        match self.backoff {
            BackoffKind::Fixed => Box::new(Constant::new(self.delay)),
            BackoffKind::Exponential => Box::new(
                ExponentialBackoffBuilder::new()
                    .with_initial_interval(self.delay)
                    .with_randomization_factor(0.0)
                    .with_multiplier(2.0)
                    .with_max_interval(self.delay.saturating_mul(64))
                    .with_max_elapsed_time(None)
                    .build(),
            ),
        }
    }

    /// Waits between consecutive attempts, one fewer than `max_attempts`
    pub fn delay_schedule(&self) -> Vec<Duration> {
        let mut delays = self.delays();
        (1..self.max_attempts.max(1))
            .map(|_| delays.next_backoff().unwrap_or(self.delay))
            .collect()
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, IngestionError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, IngestionError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut delays = self.delays();
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts && self.should_retry(&e) => {
                    let delay = delays.next_backoff().unwrap_or(self.delay);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
