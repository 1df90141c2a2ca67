//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Client frame accepted (server.rs)
//!     → pool.rs (ClusterView: healthy set + cursor, one lock)
//!     → round_robin.rs (rotate through healthy members in id order)
//!     → forward frame verbatim to the chosen backend
//!     → relay the backend's frame, or demote it and answer with an error
//! ```
//!
//! # Design Decisions
//! - The healthy set changes from two sources: the balancer's own health
//!   monitor and fail-fast demotion on a failed forward
//! - No retry against a second backend within one client request
//! - An empty healthy set answers immediately instead of waiting

pub mod pool;
pub mod round_robin;
pub mod server;

use crate::health::state::NodeDescriptor;

pub use pool::ClusterView;
pub use round_robin::RoundRobin;
pub use server::BalancerServer;

/// Selection policy over the currently healthy members.
pub trait Strategy: Send {
    /// Index into `candidates` of the member to use, or `None` if empty.
    fn next_index(&mut self, candidates: &[&NodeDescriptor]) -> Option<usize>;
}
