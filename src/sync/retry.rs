//! Retry manager for search calls with exponential backoff
//!
//! Every error is treated as retryable. Between attempts the manager gives a
//! [`RetryRecovery`] hook the chance to repair shared state (typically an
//! expired access token) before sleeping.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::SyncError;

/// Hook run after each failed attempt that will be retried
#[async_trait]
pub trait RetryRecovery: Send {
    /// Repair state before the next attempt; must not fail
    async fn recover(&mut self);
}

/// Retry manager with exponential backoff support
#[derive(Debug, Clone)]
pub struct RetryManager {
    config: RetryConfig,
}

impl RetryManager {
    /// Create a new RetryManager with the given configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create a RetryManager with default configuration
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Execute an async operation with retry logic
    ///
    /// The operation receives the recovery state so it can read values the
    /// recovery hook may have replaced, such as the current bearer token.
    /// The returned future must not borrow that state.
    ///
    /// Returns the last error once `max_attempts` attempts have failed. No
    /// backoff is slept after the final failure.
    pub async fn execute<R, F, Fut, T>(
        &self,
        recovery: &mut R,
        mut operation: F,
    ) -> Result<T, SyncError>
    where
        R: RetryRecovery + ?Sized,
        F: FnMut(&R) -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut failures = 0u32;

        loop {
            match operation(&*recovery).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    failures += 1;
                    if failures >= max_attempts {
                        warn!(
                            attempts = failures,
                            error = %err,
                            "Max attempts exhausted"
                        );
                        return Err(err);
                    }

                    recovery.recover().await;

                    let backoff = self.calculate_backoff(failures);
                    debug!(
                        attempt = failures,
                        max_attempts = max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Retrying after error"
                    );

                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Backoff to wait after the given number of failed attempts
    ///
    /// `initial_backoff_ms * multiplier^failures`, so with the defaults the
    /// first retry waits 10 seconds.
    pub fn calculate_backoff(&self, failures: u32) -> Duration {
        let factor = u64::from(self.config.backoff_multiplier).saturating_pow(failures);
        Duration::from_millis(self.config.initial_backoff_ms.saturating_mul(factor))
    }

    /// Get the retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}
