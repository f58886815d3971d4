//! Bounded retry of units of work that lost an optimistic-concurrency race.

use std::future::Future;

use tokio::time::sleep;

use crate::config::RetryConfig;
use crate::error::Result;

/// Runs `attempt` until it succeeds, fails with something other than
/// [`Conflict`](crate::FulfillmentError::Conflict), or the attempt budget is
/// spent. Each attempt must open its own transaction.
pub async fn retry_on_conflict<F, Fut, T>(
    config: &RetryConfig,
    operation: &'static str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = config.initial_delay;
    let mut tries = 0;

    loop {
        tries += 1;

        match attempt().await {
            Err(err) if err.is_conflict() && tries < config.max_attempts => {
                metrics::counter!("transaction_conflicts_total", "operation" => operation)
                    .increment(1);
                tracing::warn!(
                    operation,
                    attempt = tries,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transaction conflict, retrying"
                );
                sleep(delay).await;
                delay = config.next_delay(delay);
            }
            Err(err) => {
                if err.is_conflict() {
                    metrics::counter!("transaction_conflicts_total", "operation" => operation)
                        .increment(1);
                    tracing::warn!(operation, attempts = tries, "retry budget exhausted");
                }
                return Err(err);
            }
            Ok(value) => {
                if tries > 1 {
                    tracing::debug!(operation, attempts = tries, "succeeded after retry");
                }
                return Ok(value);
            }
        }
    }
}
