//! Retry executor
//!
//! Runs a fallible async operation under a [`RetryConfig`]:
//!
//! 1. permanent or unclassified error → stop after this attempt
//! 2. retryable error → sleep `jittered_delay(attempt)` and try again
//! 3. attempts exhausted → structured failure
//!
//! An in-flight retry cannot be cancelled mid-backoff; callers that no
//! longer care simply ignore the outcome.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;

use super::config::RetryConfig;
use crate::backend::BackendError;

/// Result of one retried invocation
#[derive(Debug, Clone)]
pub struct RetryOutcome<T> {
    /// Number of times the operation was invoked
    pub attempts: u32,
    /// Sum of all backoff sleeps
    pub total_delay: Duration,
    /// Final value, or the last error
    pub result: Result<T, BackendError>,
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn data(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&BackendError> {
        self.result.as_ref().err()
    }

    pub fn into_result(self) -> Result<T, BackendError> {
        self.result
    }
}

/// Execute `operation` with classified exponential backoff
///
/// Never returns an error directly; inspect [`RetryOutcome::result`].
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, mut operation: F) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut total_delay = Duration::ZERO;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return RetryOutcome {
                    attempts: attempt,
                    total_delay,
                    result: Ok(value),
                };
            }
            Err(err) => err,
        };

        let retryable = config.should_retry(&err);
        if !retryable || attempt >= max_attempts {
            if retryable {
                tracing::error!(
                    attempts = attempt,
                    kind = %err.kind,
                    "Operation failed after exhausting retries: {}",
                    err.message
                );
            } else {
                tracing::warn!(
                    attempts = attempt,
                    kind = %err.kind,
                    "Operation failed with non-retryable error: {}",
                    err.message
                );
            }
            if let Some(hook) = &config.on_failure {
                hook(&err, attempt);
            }
            return RetryOutcome {
                attempts: attempt,
                total_delay,
                result: Err(err),
            };
        }

        let delay = config.jittered_delay(attempt - 1);
        tracing::warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            kind = %err.kind,
            "Operation failed, retrying: {}",
            err.message
        );
        if let Some(hook) = &config.on_retry {
            hook(attempt, &err, delay);
        }
        tokio::time::sleep(delay).await;
        total_delay += delay;
    }
}

/// Throwing variant of [`with_retry`]
pub async fn with_retry_or_throw<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    with_retry(config, operation).await.into_result()
}

/// Outcomes of a batch, in input order
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    pub outcomes: Vec<RetryOutcome<T>>,
    pub succeeded: usize,
    pub failed: usize,
}

impl<T> BatchOutcome<T> {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Run `operation` over every item, each with its own retry budget
///
/// One item's failure never aborts the others (partial success).
pub async fn with_retry_batch<I, T, R, F, Fut>(
    items: I,
    config: &RetryConfig,
    operation: F,
) -> BatchOutcome<R>
where
    I: IntoIterator<Item = T>,
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, BackendError>>,
{
    let op = &operation;
    let outcomes = join_all(
        items
            .into_iter()
            .map(|item| async move { with_retry(config, || op(item.clone())).await }),
    )
    .await;

    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    let failed = outcomes.len() - succeeded;
    if failed > 0 {
        tracing::warn!(succeeded, failed, "Batch completed with failures");
    }
    BatchOutcome {
        outcomes,
        succeeded,
        failed,
    }
}
