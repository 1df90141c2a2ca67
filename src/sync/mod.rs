//! Replica synchronization.
//!
//! # Data Flow
//! ```text
//! ticker (sync.interval_ms)
//!     → ClusterView::healthy() (as last seen by this node's monitor)
//!     → StoreHandle::snapshot()
//!     → SYNC_DATA to each healthy peer, bounded concurrency
//!     → peer: Store::merge_incoming (LWW) → {"status":"sync_ok"}
//! ```

pub mod engine;

pub use engine::{SyncEngine, SyncReport};
