//! Session token handling.
//!
//! # Design Decisions
//! - Claims are decoded with `jsonwebtoken`, never by hand
//! - Signatures are not verified client-side
//! - A malformed token is an `InvalidToken` error, an expired one `SessionExpired`

pub mod claims;
pub mod store;

pub use claims::TokenClaims;
pub use store::TokenStore;
