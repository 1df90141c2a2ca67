//! Backend storage node.
//!
//! # Data Flow
//! ```text
//! frame from balancer, peer or client
//!     → server.rs (accept loop, one task per connection)
//!     → handler.rs (decode → Command → store / health flag)
//!     → Response frame back on the same connection
//!
//! background, per node:
//!     HealthMonitor over peers → ClusterView
//!     SyncEngine → SYNC_DATA to peers that view reports healthy
//! ```

pub mod handler;
pub mod server;

pub use handler::RequestHandler;
pub use server::BackendServer;
