//! Per-peer health state machine.
//!
//! # States
//! - Unknown: never probed, not eligible for routing or sync
//! - Healthy: receives traffic and sync pushes
//! - Unhealthy: excluded until the next successful probe
//!
//! # State Transitions
//! ```text
//! Unknown   → Healthy:   first successful probe
//! Healthy   → Unhealthy: one failed probe, or one failed forward
//! Unhealthy → Healthy:   one successful probe
//! ```
//!
//! # Design Decisions
//! - No hysteresis: every probe outcome applies immediately
//! - Membership is fixed at startup; only the state of a member changes

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::BackendConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthState::Healthy)
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

/// Result of one probe (or one forward attempt).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy,
    Unhealthy(String),
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Healthy)
    }
}

/// A cluster member as seen by one monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDescriptor {
    pub id: String,
    pub address: String,
    pub state: HealthState,
    pub last_probe: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl NodeDescriptor {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            state: HealthState::Unknown,
            last_probe: None,
            last_error: None,
        }
    }

    /// Apply an outcome observed at `at`. Returns the previous state when it
    /// changed.
    pub fn apply(&mut self, outcome: ProbeOutcome, at: DateTime<Utc>) -> Option<HealthState> {
        let previous = self.state;
        self.last_probe = Some(at);
        match outcome {
            ProbeOutcome::Healthy => {
                self.state = HealthState::Healthy;
                self.last_error = None;
            }
            ProbeOutcome::Unhealthy(reason) => {
                self.state = HealthState::Unhealthy;
                self.last_error = Some(reason);
            }
        }
        (previous != self.state).then_some(previous)
    }
}

impl From<&BackendConfig> for NodeDescriptor {
    fn from(config: &BackendConfig) -> Self {
        NodeDescriptor::new(config.id.clone(), config.address.clone())
    }
}
