//! Client-side response caching.
//!
//! # Data Flow
//! ```text
//! get_cached(path)
//!     → request_cache.rs: fresh entry? return it
//!     → in-flight fetch for the key? await the same shared future
//!     → otherwise register a fetch, store the value on success
//! ```
//!
//! # Design Decisions
//! - The cache is owned by the client instance, never global
//! - Failures are never cached
//! - Keys are derived from method, path and query so equal requests collapse

pub mod request_cache;

pub use request_cache::{RequestCache, DEFAULT_CACHE_TTL};

/// Build a cache key from the request identity.
pub fn cache_key(method: &str, path: &str, query: &[(String, String)]) -> String {
    let mut key = format!("{} {}", method.to_ascii_uppercase(), path);
    if !query.is_empty() {
        let mut pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
        pairs.sort();
        key.push('?');
        key.push_str(&pairs.join("&"));
    }
    key
}
