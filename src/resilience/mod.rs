//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call (probe, forward, sync push):
//!     → timeouts.rs (one deadline covering connect, write and read)
//!     → On failure: caller demotes the peer or skips it for this round
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries: a failed forward is reported to the client as-is and the
//!   backend is demoted until the next successful probe

pub mod timeouts;
