//! Error taxonomy for API calls.

use thiserror::Error;

use crate::resilience::ResilienceError;

/// Generic message shown instead of technical server detail.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errors surfaced by the request layer.
///
/// Every variant is `Clone` so one outcome can be fanned out to all callers
/// waiting on a de-duplicated request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Aborted by the caller.
    #[error("Request cancelled")]
    Cancelled,

    /// Transport deadline exceeded.
    #[error("Request timed out")]
    Timeout,

    /// Connectivity failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Short-circuited after sustained upstream failures.
    #[error("Service temporarily unavailable")]
    CircuitOpen,

    /// Hard 401: the session is gone and the user must sign in again.
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Soft 401 that may come from a restarting backend.
    #[error("Authentication temporarily failed: {0}")]
    TransientAuth(String),

    /// Permanent 403 (permissions or account setup).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Soft 403 while the backend is busy processing.
    #[error("System busy: {0}")]
    SystemBusy(String),

    /// 402: plan usage limit reached.
    #[error("Usage limit reached: {0}")]
    UsageLimitReached(String),

    /// 429.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Other 4xx; message already sanitized.
    #[error("Request failed ({status}): {message}")]
    ClientError { status: u16, message: String },

    /// 5xx.
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Non-success status outside 4xx/5xx (an unfollowed redirect, 1xx).
    #[error("Unexpected response status {status}")]
    UnexpectedStatus { status: u16 },

    /// Bearer token could not be decoded.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The request could not be built (bad path, bad header value).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// CSV export failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// A polled server-side job reached the `failed` state.
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// A polled job did not finish within the poll budget.
    #[error("Job still running after {attempts} polls")]
    PollExhausted { attempts: u32 },
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Whether the executor may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Timeout
                | ApiError::Network(_)
                | ApiError::TransientAuth(_)
                | ApiError::SystemBusy(_)
                | ApiError::RateLimited(_)
                | ApiError::ServerError { .. }
        )
    }

    /// HTTP status behind the error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::SessionExpired(_) | ApiError::TransientAuth(_) => Some(401),
            ApiError::UsageLimitReached(_) => Some(402),
            ApiError::Forbidden(_) | ApiError::SystemBusy(_) => Some(403),
            ApiError::RateLimited(_) => Some(429),
            ApiError::ClientError { status, .. }
            | ApiError::ServerError { status, .. }
            | ApiError::UnexpectedStatus { status } => Some(*status),
            _ => None,
        }
    }

    /// Cancellation unwinds quietly; nothing should be shown to the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    /// Whether the caller should send the user back through sign-in.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_) | ApiError::InvalidToken(_))
    }

    /// Message suitable for an operator-facing error banner.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Cancelled => String::new(),
            ApiError::Timeout => "The request took too long. Please try again.".to_string(),
            ApiError::Network(_) => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            ApiError::CircuitOpen => {
                "Service temporarily unavailable. Please try again shortly.".to_string()
            }
            ApiError::SessionExpired(_) | ApiError::InvalidToken(_) => {
                "Your session has expired. Please sign in again.".to_string()
            }
            ApiError::TransientAuth(_) | ApiError::SystemBusy(_) => {
                "The system is busy. Please try again in a moment.".to_string()
            }
            ApiError::UsageLimitReached(msg) if !msg.is_empty() => msg.clone(),
            ApiError::UsageLimitReached(_) => {
                "You have reached your plan's usage limit. Upgrade to continue.".to_string()
            }
            ApiError::RateLimited(_) => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            ApiError::Forbidden(msg) | ApiError::ClientError { message: msg, .. } => msg.clone(),
            ApiError::JobFailed(msg) => msg.clone(),
            ApiError::PollExhausted { .. } => {
                "Processing is taking longer than expected. Check back later.".to_string()
            }
            ApiError::ServerError { .. }
            | ApiError::UnexpectedStatus { .. }
            | ApiError::Decode(_)
            | ApiError::InvalidRequest(_)
            | ApiError::Export(_) => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

impl ResilienceError for ApiError {
    fn is_retryable(&self) -> bool {
        ApiError::is_retryable(self)
    }

    fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    fn cancelled() -> Self {
        ApiError::Cancelled
    }

    fn circuit_open() -> Self {
        ApiError::CircuitOpen
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}
