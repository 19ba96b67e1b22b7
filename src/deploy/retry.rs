// ABOUTME: Bounded retry with doubling backoff for transient collaborator errors.
// ABOUTME: Non-transient errors surface immediately without retrying.

use std::fmt::Display;
use std::future::Future;

use crate::config::RetryConfig;

/// Run `op` up to `retry.attempts` times, sleeping `retry.backoff`
/// (doubled after each failure) between attempts. Errors for which
/// `is_transient` returns false are returned immediately.
pub async fn with_backoff<T, E, F, Fut, P>(
    retry: &RetryConfig,
    is_transient: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let attempts = retry.attempts.max(1);
    let mut backoff = retry.backoff;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && is_transient(&e) => {
                tracing::warn!(
                    "transient error (attempt {}/{}), retrying in {:?}: {}",
                    attempt,
                    attempts,
                    backoff,
                    e
                );
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
            Err(e) => return Err(e),
        }
    }

    unreachable!("loop returns on the final attempt")
}
