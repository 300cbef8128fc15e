use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Failures that may succeed when the same request is sent again
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Backoff schedule for embedding requests.
///
/// Attempt `n` (zero based) waits `initial_backoff * 2^n`, capped at
/// `max_backoff`, before attempt `n + 1`. Permanent failures end the
/// schedule on the spot.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    fn delay_before(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `request` until it succeeds, fails permanently, or the retry
    /// allowance for `label` is spent
    pub async fn run<F, Fut, T, E>(&self, label: &str, mut request: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        let mut retry = 0;
        loop {
            let err = match request().await {
                Ok(value) => {
                    if retry > 0 {
                        tracing::debug!(label, retries = retry, "Embedding request recovered");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                tracing::warn!(label, error = %err, "Embedding request rejected, not retrying");
                return Err(err);
            }
            if retry == self.max_retries {
                tracing::warn!(label, attempts = retry + 1, error = %err, "Embedding backend still failing, giving up");
                return Err(err);
            }

            retry += 1;
            let delay = self.delay_before(retry);
            tracing::debug!(label, retry, delay_ms = delay.as_millis() as u64, error = %err, "Embedding request failed, backing off");
            tokio::time::sleep(delay).await;
        }
    }
}
