//! Timeout enforcement.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from cancellation and are retryable

use std::future::Future;
use std::time::Duration;

use crate::http::types::{ApiError, ApiResult};

/// Bound `fut` by `duration`, mapping expiry to [`ApiError::Timeout`].
pub async fn with_timeout<T, F>(duration: Duration, fut: F) -> ApiResult<T>
where
    F: Future<Output = ApiResult<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout = ?duration, "Operation timed out");
            Err(ApiError::Timeout)
        }
    }
}
