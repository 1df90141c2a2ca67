//! Passive health checking (failure detection).
//!
//! # Responsibilities
//! - Observe forward outcomes on the request path
//! - Demote a backend on its first failed forward
//!
//! # Design Decisions
//! - Only transport failures count: refused, reset, timeout, bad framing
//! - A backend's own error response is relayed, not held against it
//! - Recovery is left to the active monitor's next successful probe

use crate::error::Error;
use crate::health::state::NodeDescriptor;
use crate::load_balancer::pool::ClusterView;
use crate::observability::metrics;

/// Record a failed forward to `backend`, removing it from the healthy set.
pub fn report_forward_failure(view: &ClusterView, backend: &NodeDescriptor, error: &Error) {
    if view.demote(&backend.id, error.to_string()) {
        tracing::warn!(
            backend = %backend.id,
            addr = %backend.address,
            error = %error,
            "Backend demoted after failed forward"
        );
    }
    metrics::set_healthy_members("balancer", view.healthy_count());
}
