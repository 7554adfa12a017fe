// Bounded exponential backoff for platform calls

use crate::error::PublishError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

impl RetryPolicy {
    pub fn new(base_delay_ms: u64, max_retries: u32) -> Self {
        Self {
            base_delay_ms,
            max_retries,
        }
    }

    /// `base_delay_ms * 2^(attempt-1)` for the 1-based retry `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << exponent))
    }
}

/// Run `op`, retrying 429/5xx responses with exponential backoff.
///
/// Any other error propagates immediately. Cancellation is observed before
/// each attempt and during backoff; an in-flight request is never abandoned.
pub async fn with_retries<T, F, Fut>(policy: &RetryPolicy, cancel: &CancellationToken, mut op: F) -> Result<T, PublishError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PublishError>>,
{
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after transient platform error"
                );

                tokio::select! {
                    _ = cancel.cancelled() => return Err(PublishError::Cancelled),
                    _ = sleep(delay) => {}
                }
            }
            Err(err) => return Err(err),
        }
    }
}
