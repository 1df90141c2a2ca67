//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Bind every listener → Start servers
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Report unhealthy → Drain → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     Second signal  → Exit without draining
//! ```
//!
//! # Design Decisions
//! - Fail fast: a listener that cannot bind aborts startup before any server runs
//! - Shutdown has timeout: connections still open after the drain deadline are abandoned

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{launch, Role};
