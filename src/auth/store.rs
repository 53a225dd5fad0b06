//! Swappable bearer token slot shared by every request.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{Duration, Utc};

use crate::auth::claims::TokenClaims;
use crate::http::types::{ApiError, ApiResult};

#[derive(Debug)]
struct StoredToken {
    raw: String,
    claims: ApiResult<TokenClaims>,
}

/// Holds the current session token, decoded once per update.
#[derive(Debug, Default)]
pub struct TokenStore {
    current: ArcSwapOption<StoredToken>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set(token);
        store
    }

    /// Read the token from environment variable `var`; empty when unset.
    pub fn from_env(var: &str) -> Self {
        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => Self::with_token(token.trim()),
            _ => {
                tracing::debug!(var, "No bearer token in environment");
                Self::new()
            }
        }
    }

    pub fn set(&self, token: impl Into<String>) {
        let raw = token.into();
        let claims = TokenClaims::decode(&raw);
        if let Err(e) = &claims {
            tracing::warn!(error = %e, "Stored token is not a decodable JWT");
        }
        self.current.store(Some(Arc::new(StoredToken { raw, claims })));
    }

    pub fn clear(&self) {
        self.current.store(None);
    }

    pub fn is_set(&self) -> bool {
        self.current.load().is_some()
    }

    /// Decoded claims of the current token, if any.
    pub fn claims(&self) -> ApiResult<Option<TokenClaims>> {
        match self.current.load_full() {
            Some(stored) => stored.claims.clone().map(Some),
            None => Ok(None),
        }
    }

    /// The raw token to send, failing early when it is malformed or expired.
    pub fn bearer(&self) -> ApiResult<Option<String>> {
        let Some(stored) = self.current.load_full() else {
            return Ok(None);
        };
        let claims = stored.claims.clone()?;
        if claims.is_expired_at(Utc::now(), Duration::zero()) {
            return Err(ApiError::SessionExpired("Token has expired".to_string()));
        }
        Ok(Some(stored.raw.clone()))
    }
}
