//! Bounded retry with exponential backoff for transient store conflicts.
//!
//! One policy drives every retried call in the mutation layer; call sites
//! never roll their own loops. Only errors classified transient by
//! [`GraphError::is_transient`] are retried; structural and validation
//! failures propagate immediately.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use super::error::GraphError;
use crate::config::RetryConfig;

/// Retry policy: a fixed number of retries with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    multiplier: u32,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.backoff_multiplier.max(1),
        }
    }

    /// Backoff before retry number `retry` (zero-based): base * multiplier^retry.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * self.multiplier.saturating_pow(retry)
    }

    /// Run `op`, retrying transient failures up to `max_retries` times with
    /// backoff sleeps in between. The final error is returned unchanged once
    /// retries are exhausted.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T, GraphError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, GraphError>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && retry < self.max_retries => {
                    let delay = self.delay_for(retry);
                    debug!(retry, delay_ms = delay.as_millis() as u64, "transient conflict, backing off");
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}
