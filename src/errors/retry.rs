use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::types::ApexError;

/// Backoff policy applied when a job fails with a retryable error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Default retry ceiling for jobs that do not set their own.
    pub max_retries: u32,
    /// Upper bound accepted for per-job `max_retries` overrides.
    pub max_retries_ceiling: u32,
    pub backoff_base_secs: f64,
    pub backoff_cap_secs: f64,
    /// Adds up to one base interval of random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_retries_ceiling: 10,
            backoff_base_secs: 5.0,
            backoff_cap_secs: 300.0,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Delay before a job re-enters the ready queue, where `retries` is the
    /// already-incremented retry count: `base * 2^retries`, capped.
    pub fn delay(&self, retries: u32) -> Duration {
        let exp = 2.0_f64.powi(retries.min(31) as i32);
        let mut secs = (self.backoff_base_secs * exp).min(self.backoff_cap_secs);
        if self.jitter {
            let jitter: f64 = rand::random::<f64>() * self.backoff_base_secs;
            secs = (secs + jitter).min(self.backoff_cap_secs);
        }
        Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
    }
}

/// Execute an async operation, retrying retryable errors with the policy's
/// backoff. Used for outbound calls (e.g. the CLI talking to a server), not
/// for job execution, which is retried by the scheduler.
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut factory: F,
) -> Result<T, ApexError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApexError>>,
{
    let max_attempts = policy.max_retries + 1;
    let mut attempt = 0;

    loop {
        match factory().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let classification = e.classify();
                attempt += 1;

                if !classification.retryable || attempt >= max_attempts {
                    warn!(
                        operation = operation_name,
                        attempts = attempt,
                        error_type = classification.error_type,
                        "Giving up"
                    );
                    return Err(e);
                }

                let delay = policy.delay(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    max = max_attempts,
                    error_type = classification.error_type,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
