use crate::error::DigestResult;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded retry policy for outbound calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry, doubled afterwards
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Policy that never retries
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Create a policy from settings values
    pub fn new(max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(backoff_ms),
        }
    }

    /// Backoff before the given retry (1-based)
    fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Run `op`, retrying transient failures according to `policy`
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, call: &str, mut op: F) -> DigestResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DigestResult<T>>,
{
    let mut retry = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && retry < policy.max_retries => {
                retry += 1;
                let delay = policy.backoff(retry);
                warn!(
                    "{} failed transiently (retry {}/{} in {:?}): {}",
                    call, retry, policy.max_retries, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
