use std::future::Future;
use std::time::Duration;
use webgather_core::{Error, Result};

use crate::config::Config;

/// Retry knobs shared by every executor: total attempt ceiling plus the
/// linear backoff base (the n-th retry waits `base_delay * n`).
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_attempts: cfg.max_retries.max(1),
            base_delay: cfg.retry_delay,
        }
    }
}

/// Run `op` up to the policy's attempt ceiling.
///
/// Only errors accepted by `retryable` earn another attempt; everything else
/// (and the final attempt's error) is surfaced to the caller unchanged, so
/// the classified failure ends up in the item's outcome record.
pub(crate) async fn with_retries<T, F, Fut, R>(
    policy: &RetryPolicy,
    retryable: R,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    R: Fn(&Error) -> bool,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if retryable(&e) && attempt < policy.max_attempts => {
                let delay = policy.base_delay * attempt;
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e,
                    "transient failure, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
