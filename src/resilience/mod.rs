//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound API call:
//!     → retries.rs (attempt loop, backoff.rs for the wait between attempts)
//!     → circuit_breaker.rs (short-circuit while the backend is failing)
//!     → timeouts.rs (every network call has a deadline)
//!     → http::response (classify the outcome into an ApiError)
//! ```
//!
//! # Design Decisions
//! - The executor and the breaker are generic over the error type; the
//!   error decides its own retryability through [`ResilienceError`]
//! - Cancellation is cooperative and checked at every loop boundary
//! - `CircuitOpen` is never retried by the executor; the breaker already
//!   encodes its own wait policy

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use backoff::BackoffPolicy;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};
pub use retries::{retry_with_backoff, RetryPolicy};
pub use timeouts::with_timeout;

/// Errors that can flow through the retry executor and the circuit breaker.
pub trait ResilienceError: Sized {
    /// Whether a failed attempt with this error may be retried.
    fn is_retryable(&self) -> bool;

    /// Whether this error is the synthetic cancellation error.
    fn is_cancelled(&self) -> bool;

    /// The error surfaced when the caller aborted the operation.
    fn cancelled() -> Self;

    /// The error surfaced when the circuit breaker rejects a call.
    fn circuit_open() -> Self;
}
