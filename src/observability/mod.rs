//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request layer produces:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and histograms via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional, installed by the binary)
//! ```
//!
//! # Design Decisions
//! - The library only emits; subscribers and recorders are installed by the binary
//! - Request ID is attached to every request span
//! - Without a recorder installed, metric updates are no-ops

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
