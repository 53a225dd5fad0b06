//! Typed wrappers for the backend resources.
//!
//! Each wrapper owns a clone of the shared [`ApiClient`](crate::http::ApiClient),
//! so they all share one token, cache and circuit breaker.

pub mod calls;
pub mod diff;
pub mod leads;
pub mod prompts;
pub mod types;
pub mod webhooks;

pub use calls::CallsApi;
pub use diff::{prompt_diff, PromptDiff};
pub use leads::{LeadsApi, NewLead};
pub use prompts::PromptsApi;
pub use webhooks::WebhooksApi;
