use crate::error::LedgerError;
use backoff::future::retry_notify;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff used for ledger conflicts: short first wait, capped growth.
pub fn conflict_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(500),
        max_elapsed_time: Some(Duration::from_secs(10)),
        ..Default::default()
    }
}

/// Re-run `op` while it fails with [`LedgerError::ConcurrencyConflict`].
///
/// Every attempt must open its own unit of work; the failed one has already
/// rolled back. Any other error is returned immediately.
pub async fn retry_on_conflict<T, F, Fut>(op: F) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    retry_on_conflict_with(conflict_backoff(), op).await
}

pub async fn retry_on_conflict_with<T, F, Fut>(
    policy: ExponentialBackoff,
    mut op: F,
) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    retry_notify(
        policy,
        || {
            let attempt = op();
            async move {
                attempt.await.map_err(|e| {
                    if e.is_retryable() {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        },
        |err: LedgerError, wait: Duration| {
            warn!(error = %err, wait_ms = wait.as_millis() as u64, "retrying ledger operation");
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_retries_conflicts_until_success() {
        let attempts = AtomicUsize::new(0);
        let result = retry_on_conflict(|| async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LedgerError::ConcurrencyConflict)
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), _> = retry_on_conflict(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::AlreadyFunded)
        })
        .await;
        assert_eq!(result, Err(LedgerError::AlreadyFunded));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_elapsed() {
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(2),
            max_elapsed_time: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let result: Result<(), _> =
            retry_on_conflict_with(policy, || async { Err(LedgerError::ConcurrencyConflict) })
                .await;
        assert_eq!(result, Err(LedgerError::ConcurrencyConflict));
    }
}
