//! Node-local storage subsystem.
//!
//! # Data Flow
//! ```text
//! connection task / sync engine
//!     → actor.rs (StoreHandle: command + oneshot reply)
//!     → memory.rs (Store: get / set / merge, LWW by timestamp)
//!     → persistence.rs (full snapshot rewritten after each change)
//! ```
//!
//! # Design Decisions
//! - Each backend node owns exactly one store; nodes share nothing and
//!   replicate only through `SYNC_DATA` messages
//! - Wall-clock timestamps are the sole version marker, so replicas are
//!   only as consistent as the node clocks

pub mod actor;
pub mod memory;
pub mod persistence;
pub mod record;

pub use actor::StoreHandle;
pub use memory::Store;
pub use persistence::SnapshotFile;
pub use record::{Record, Snapshot};
