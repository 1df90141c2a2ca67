//! Replicated key-value cluster library.
//!
//! A load balancer spreads client requests round-robin over a fixed set of
//! storage nodes. Each node keeps its own store, persists it to a JSON
//! snapshot, and periodically pushes that snapshot to the peers it sees as
//! healthy; receivers merge by last-write-wins on the record timestamp.

// Core subsystems
pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod store;

// Cluster roles
pub mod load_balancer;
pub mod node;

// Cluster maintenance
pub mod health;
pub mod sync;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ClusterConfig;
pub use error::{Error, Result};
pub use lifecycle::{Role, Shutdown};
pub use load_balancer::BalancerServer;
pub use node::BackendServer;
