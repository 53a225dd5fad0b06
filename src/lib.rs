//! Resilient API client for the DialDesk voice sales platform.
//!
//! # Architecture Overview
//!
//! ```text
//!   api (leads, calls, webhooks, prompts)     jobs (status polling)     export (CSV)
//!                        │                           │
//!                        ▼                           ▼
//!   ┌───────────────────────────────────────────────────────────────┐
//!   │ http::ApiClient                                               │
//!   │   cache (dedup + TTL) → retries → circuit breaker → timeout   │
//!   │   → reqwest → http::response (classification into ApiError)   │
//!   └───────────────────────────────────────────────────────────────┘
//!        ▲            ▲               ▲                 ▲
//!      auth        config       observability       lifecycle
//!   (JWT claims)   (TOML)     (tracing, metrics)  (cancellation)
//! ```

// Core request layer
pub mod cache;
pub mod http;
pub mod resilience;

// Backend resources
pub mod api;
pub mod export;
pub mod jobs;

// Cross-cutting concerns
pub mod auth;
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::ClientConfig;
pub use http::{ApiClient, ApiError, ApiResult, RequestOptions};
pub use lifecycle::Shutdown;
