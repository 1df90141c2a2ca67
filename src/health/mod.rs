//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → HEALTH_CHECK to each member
//!     → Update ClusterView via state.rs
//!
//! Passive health checks (passive.rs):
//!     Forward failure observed by the balancer
//!     → Demote that backend at once
//!
//! State machine (state.rs):
//!     Unknown → Healthy ←→ Unhealthy
//!     Every outcome applies immediately
//! ```
//!
//! # Design Decisions
//! - Both the balancer and every backend run their own monitor; views are
//!   never shared between processes
//! - A node only asserts its own liveness, never hearsay about peers
//! - A failed probe is logged and the loop carries on

pub mod active;
pub mod passive;
pub mod state;

pub use active::HealthMonitor;
pub use state::{HealthState, NodeDescriptor, ProbeOutcome};
