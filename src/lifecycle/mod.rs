//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Install metrics → Build token store → Build ApiClient
//!
//! Shutdown (shutdown.rs):
//!     Trigger → root token cancelled → retry and poll loops unwind with Cancelled
//!
//! Signals (signals.rs):
//!     Ctrl-C → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Cancellation is a token tree; every call gets a child of the root

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::start;
