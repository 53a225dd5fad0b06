//! HTTP request layer.
//!
//! # Data Flow
//! ```text
//! ApiClient call (client.rs)
//!     → request.rs (resolve URL, add request ID and bearer token)
//!     → resilience stack (retry → circuit breaker → timeout)
//!     → reqwest send
//!     → response.rs (decode 2xx, classify everything else)
//!     → types.rs ApiError on failure
//! ```

pub mod client;
pub mod request;
pub mod response;
pub mod types;

pub use client::{ApiClient, MultipartUpload, RequestOptions};
pub use request::{RequestId, X_REQUEST_ID};
pub use types::{ApiError, ApiResult};
