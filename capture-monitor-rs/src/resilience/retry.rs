//! Retry with backoff
//!
//! `RetryExecutor` re-runs a fallible async operation according to a
//! [`RetryConfig`]. The last error is propagated unchanged in kind, wrapped
//! with the number of attempts made.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use log::warn;

use crate::error::Result;

/// Retry policy configuration; every error triggers another attempt
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Strategy name used in log lines
    pub name: &'static str,

    /// Maximum number of retry attempts (0 means no retries)
    pub max_retries: u32,

    /// Initial backoff duration
    pub initial_interval: Duration,

    /// Maximum backoff duration
    pub max_interval: Duration,

    /// Multiplier for backoff between retries
    pub multiplier: f64,

    /// Randomization applied to backoff intervals
    pub randomization_factor: f64,
}

impl RetryConfig {
    /// Run once, and run exactly once more on any failure.
    ///
    /// Used for evaluation runs, whose first pass fails intermittently upstream
    /// regardless of the error kind.
    pub fn two_pass(delay: Duration) -> Self {
        Self {
            name: "two-pass",
            max_retries: 1,
            initial_interval: delay,
            max_interval: delay,
            multiplier: 1.0,
            randomization_factor: 0.0,
        }
    }
}

impl fmt::Display for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RetryConfig {{ name: {}, max_retries: {}, initial_interval: {:?}, max_interval: {:?}, multiplier: {} }}",
            self.name, self.max_retries, self.initial_interval, self.max_interval, self.multiplier
        )
    }
}

/// Executor for retry operations
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute a fallible operation with retries according to the configuration
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = ExponentialBackoff {
            current_interval: self.config.initial_interval,
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            multiplier: self.config.multiplier,
            randomization_factor: self.config.randomization_factor,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };

        let mut attempts: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempts < self.config.max_retries => {
                    let delay = backoff.next_backoff().unwrap_or(self.config.max_interval);
                    attempts += 1;

                    warn!(
                        "{} attempt {}/{} failed, retrying in {:?}: {}",
                        self.config.name,
                        attempts,
                        self.config.max_retries + 1,
                        delay,
                        err
                    );

                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => {
                    if attempts > 0 {
                        return Err(err.with_context_value("attempts", attempts + 1));
                    }
                    return Err(err);
                }
            }
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}
