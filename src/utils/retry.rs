// utils/retry.rs
//
// Bounded exponential backoff for provider calls. Only errors classified as
// retryable are retried; validation and fraud failures surface immediately.

use std::future::Future;
use std::time::Duration;

use crate::errors::PaymentError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(initial_delay_ms),
            multiplier: 2,
        }
    }
}

/// Run an async operation, retrying transient failures with exponential
/// backoff. The final error is returned unchanged.
pub async fn retry_operation<T, F, Fut>(
    policy: RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, PaymentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PaymentError>>,
{
    let mut delay = policy.initial_delay;

    for attempt in 1..=policy.max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                delay *= policy.multiplier;
            }
            Err(err) => return Err(err),
        }
    }

    Err(PaymentError::Internal(format!(
        "{operation_name}: retry loop exhausted"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, 1);

        let result = retry_operation(policy, "test", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(PaymentError::Network("connection reset".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_validation_errors() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, 1);

        let result: Result<(), _> = retry_operation(policy, "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(PaymentError::validation("amount", "must be positive")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn returns_last_error_when_exhausted() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, 1);

        let result: Result<(), _> = retry_operation(policy, "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(PaymentError::Timeout("provider timed out".into())) }
        })
        .await;

        assert!(matches!(result, Err(PaymentError::Timeout(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
