// Bounded retry for fetchers
// Author: kelexine (https://github.com/kelexine)
//
// The cache and prefetch layers treat every fetcher failure the same way.
// Callers that want transient failures retried wrap their fetcher here
// before handing it over.

use backoff::{backoff::Backoff, ExponentialBackoff};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of attempts, including the first one
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Create exponential backoff configuration for retries
pub fn create_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        current_interval: Duration::from_millis(250),     // Start at 250ms
        initial_interval: Duration::from_millis(250),
        randomization_factor: 0.3,                        // Add jitter
        multiplier: 2.0,                                  // Double each time
        max_interval: Duration::from_secs(5),             // Cap at 5s
        max_elapsed_time: Some(Duration::from_secs(30)),  // Give up after 30s
        ..Default::default()
    }
}

/// Execute `operation` until it succeeds, returns a non-retryable error,
/// or `max_attempts` is reached. The last error is returned unchanged.
pub async fn with_retry<F, Fut, T, E, R>(
    operation_name: &str,
    max_attempts: u32,
    is_retryable: R,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut backoff = create_backoff();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                if !is_retryable(&e) || attempt >= max_attempts {
                    if attempt > 1 {
                        warn!("{} failed after {} attempts: {}", operation_name, attempt, e);
                    }
                    return Err(e);
                }

                let Some(delay) = backoff.next_backoff() else {
                    warn!("{} exhausted its retry window: {}", operation_name, e);
                    return Err(e);
                };
                debug!(
                    "{} failed (attempt {}), retrying after {}ms: {}",
                    operation_name,
                    attempt,
                    delay.as_millis(),
                    e
                );

                // Wait before retry
                tokio::time::sleep(delay).await;
            }
        }
    }
}
