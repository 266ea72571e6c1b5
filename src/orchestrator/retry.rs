//! Bounded retry loop shared by cached fetches and analysis requests

use super::policy::FetchPolicy;
use crate::error::{AppError, Result};
use std::future::Future;
use tracing::{debug, warn};

/// Run `producer` until it succeeds, fails non-transiently, or the attempt budget is spent.
///
/// Each attempt invokes the producer exactly once and is bounded by
/// `policy.attempt_timeout`; an expired attempt is a transient failure. `on_retry` is
/// called with the failed attempt number and its error before the backoff sleep.
pub async fn run_with_retry<T, F, Fut, R>(
    label: &str,
    policy: &FetchPolicy,
    mut on_retry: R,
    producer: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
    R: FnMut(u32, &AppError),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        debug!("{}: attempt {}/{}", label, attempt, max_attempts);

        let outcome = match tokio::time::timeout(policy.attempt_timeout, producer()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AppError::Transient(format!(
                "{} timed out after {:?}",
                label, policy.attempt_timeout
            ))),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = policy.backoff.delay(attempt);
                warn!(
                    "{}: attempt {} failed ({}), retrying in {:?}",
                    label, attempt, err, delay
                );
                on_retry(attempt, &err);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                warn!("{}: giving up after {} attempt(s): {}", label, attempt, err);
                return Err(err);
            }
        }
    }
}
