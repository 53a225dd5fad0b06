//! Outbound request decoration.
//!
//! # Responsibilities
//! - Generate a unique request ID per attempt (UUID v4)
//! - Attach the request ID and bearer token headers
//! - Resolve API paths against the configured base URL
//!
//! # Design Decisions
//! - Each retry attempt gets a fresh ID so server logs can tell attempts apart
//! - Paths are appended to the base URL rather than resolved, so a base URL
//!   with a path prefix (`https://host/v1`) keeps that prefix

use std::fmt;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::RequestBuilder;
use url::Url;
use uuid::Uuid;

use crate::http::types::{ApiError, ApiResult};

/// Header carrying the per-attempt request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Unique identifier of one HTTP attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Header helpers for [`reqwest::RequestBuilder`].
pub trait RequestBuilderExt: Sized {
    fn request_id(self, id: &RequestId) -> Self;

    /// Adds `Authorization: Bearer <token>`; no-op without a token.
    fn bearer(self, token: Option<&str>) -> ApiResult<Self>;
}

impl RequestBuilderExt for RequestBuilder {
    fn request_id(self, id: &RequestId) -> Self {
        self.header(X_REQUEST_ID, id.to_string())
    }

    fn bearer(self, token: Option<&str>) -> ApiResult<Self> {
        match token {
            Some(token) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| ApiError::InvalidToken("token contains invalid characters".into()))?;
                value.set_sensitive(true);
                Ok(self.header(AUTHORIZATION, value))
            }
            None => Ok(self),
        }
    }
}

/// Append `path` to `base`, normalising the slash between them.
pub fn join_url(base: &Url, path: &str) -> ApiResult<Url> {
    if path.starts_with("http://") || path.starts_with("https://") {
        return Url::parse(path).map_err(|e| ApiError::InvalidRequest(e.to_string()));
    }
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| ApiError::InvalidRequest(e.to_string()))
}
