//! Retry executor.
//!
//! # Responsibilities
//! - Run an async operation up to `max_attempts` times
//! - Ask the policy's `should_retry` predicate before every retry
//! - Wait a jittered exponential backoff between attempts
//! - Stop immediately when the cancellation token fires
//!
//! # Design Decisions
//! - The final error is the last attempt's error, never wrapped
//! - `Cancelled` is the only synthetic error the executor produces
//! - Jittered backoff prevents synchronized retry storms across clients

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::observability::metrics;
use crate::resilience::backoff::BackoffPolicy;
use crate::resilience::ResilienceError;

/// Predicate deciding whether `(error, attempt)` may be retried.
pub type ShouldRetry<E> = Arc<dyn Fn(&E, u32) -> bool + Send + Sync>;

/// Observability hook called before each backoff wait with `(error, attempt, delay)`.
pub type OnRetry<E> = Arc<dyn Fn(&E, u32, Duration) + Send + Sync>;

/// Retry policy for [`retry_with_backoff`].
pub struct RetryPolicy<E> {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay schedule between attempts.
    pub backoff: BackoffPolicy,
    /// Retry predicate. Defaults to [`ResilienceError::is_retryable`].
    pub should_retry: ShouldRetry<E>,
    /// Optional hook, no effect on control flow.
    pub on_retry: Option<OnRetry<E>>,
    /// Aborts the loop before the next attempt or during a backoff wait.
    pub cancellation: Option<CancellationToken>,
}

impl<E: ResilienceError + 'static> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
            should_retry: Arc::new(|err: &E, _attempt| err.is_retryable()),
            on_retry: None,
            cancellation: None,
        }
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            should_retry: self.should_retry.clone(),
            on_retry: self.on_retry.clone(),
            cancellation: self.cancellation.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("on_retry", &self.on_retry.is_some())
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl<E> RetryPolicy<E> {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E, u32) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    pub fn with_on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(&E, u32, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }
}

/// Execute `op` under `policy`.
///
/// `op` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy<E>, mut op: F) -> Result<T, E>
where
    E: ResilienceError + fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 1;

    loop {
        if policy.is_cancelled() {
            tracing::debug!(attempt, "Operation cancelled before attempt");
            return Err(E::cancelled());
        }

        let err = match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation recovered after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if err.is_cancelled() || attempt >= max_attempts || !(policy.should_retry)(&err, attempt) {
            if attempt > 1 {
                tracing::warn!(attempts = attempt, error = %err, "Giving up after retries");
            }
            return Err(err);
        }

        let delay = policy.backoff.delay(attempt);
        tracing::debug!(attempt, delay = ?delay, error = %err, "Retrying after failure");
        metrics::record_retry(attempt);
        if let Some(hook) = &policy.on_retry {
            hook(&err, attempt, delay);
        }

        match &policy.cancellation {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!(attempt, "Operation cancelled during backoff");
                        return Err(E::cancelled());
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => tokio::time::sleep(delay).await,
        }

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::types::ApiError;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy<ApiError> {
        RetryPolicy::default().with_backoff(BackoffPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            multiplier: 2.0,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausted_returns_last_error() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy().with_max_attempts(4);

        let result: Result<(), ApiError> = retry_with_backoff(&policy, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Err(ApiError::ServerError {
                    status: 503,
                    message: format!("attempt {attempt}"),
                })
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(ApiError::ServerError { message, .. }) => assert_eq!(message, "attempt 4"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_invoked_once() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy().with_max_attempts(10);

        let result: Result<(), ApiError> = retry_with_backoff(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ApiError::ClientError {
                    status: 404,
                    message: "Not found".into(),
                })
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ApiError::ClientError { status: 404, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy();

        let result = retry_with_backoff(&policy, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(ApiError::Timeout)
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_attempt() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();
        token.cancel();
        let policy = fast_policy().with_cancellation(token);

        let result: Result<(), ApiError> = retry_with_backoff(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(result, Err(ApiError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_prevents_next_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();
        let policy = RetryPolicy::default()
            .with_backoff(BackoffPolicy {
                initial_delay: Duration::from_secs(10),
                max_delay: Duration::from_secs(30),
                multiplier: 2.0,
            })
            .with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let counter = calls.clone();
        let result: Result<(), ApiError> = retry_with_backoff(&policy, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::Network("connection reset".into())) }
        })
        .await;

        canceller.await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ApiError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_predicate_and_hook() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook_seen = seen.clone();
        let policy = fast_policy()
            .with_max_attempts(5)
            .with_should_retry(|_err: &ApiError, attempt| attempt < 2)
            .with_on_retry(move |_err, attempt, delay| hook_seen.lock().push((attempt, delay)));

        let calls = AtomicU32::new(0);
        let result: Result<(), ApiError> = retry_with_backoff(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::Timeout) }
        })
        .await;

        assert!(matches!(result, Err(ApiError::Timeout)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 1);
        assert!(seen[0].1 >= Duration::from_millis(75) && seen[0].1 <= Duration::from_millis(125));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_attempts_runs_once() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy().with_max_attempts(0);

        let _: Result<(), ApiError> = retry_with_backoff(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::Timeout) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
