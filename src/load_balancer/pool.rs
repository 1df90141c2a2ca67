//! Cluster membership and the healthy set.
//!
//! # Responsibilities
//! - Hold the fixed member list, ordered by node id
//! - Apply probe outcomes and fail-fast demotions
//! - Select the next healthy member for a request
//!
//! # Design Decisions
//! - Member states and the round-robin cursor sit behind one mutex, so a
//!   selection never races a demotion or a probe result
//! - Critical sections are a few comparisons long; no I/O under the lock
//! - Callers get cloned descriptors, never references into the view

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::config::BackendConfig;
use crate::health::state::{HealthState, NodeDescriptor, ProbeOutcome};
use crate::load_balancer::round_robin::RoundRobin;
use crate::load_balancer::Strategy;

struct ViewState {
    members: Vec<NodeDescriptor>,
    strategy: Box<dyn Strategy>,
}

/// A process-local view of the cluster.
///
/// The balancer keeps one covering every backend; each backend keeps one
/// covering its peers (itself excluded).
pub struct ClusterView {
    inner: Mutex<ViewState>,
}

impl fmt::Debug for ClusterView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterView").field("members", &self.members()).finish()
    }
}

impl ClusterView {
    /// Create a view over `members` using round-robin selection.
    pub fn new<'a>(members: impl IntoIterator<Item = &'a BackendConfig>) -> Self {
        Self::with_strategy(members, Box::new(RoundRobin::new()))
    }

    pub fn with_strategy<'a>(
        members: impl IntoIterator<Item = &'a BackendConfig>,
        strategy: Box<dyn Strategy>,
    ) -> Self {
        let mut members: Vec<NodeDescriptor> = members.into_iter().map(NodeDescriptor::from).collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            inner: Mutex::new(ViewState { members, strategy }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.inner.lock().expect("cluster view mutex poisoned")
    }

    /// Every member, healthy or not, in id order.
    pub fn members(&self) -> Vec<NodeDescriptor> {
        self.state().members.clone()
    }

    /// Members currently classified Healthy, in id order.
    pub fn healthy(&self) -> Vec<NodeDescriptor> {
        self.state()
            .members
            .iter()
            .filter(|m| m.state.is_healthy())
            .cloned()
            .collect()
    }

    pub fn healthy_count(&self) -> usize {
        self.state().members.iter().filter(|m| m.state.is_healthy()).count()
    }

    pub fn len(&self) -> usize {
        self.state().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().members.is_empty()
    }

    pub fn state_of(&self, id: &str) -> Option<HealthState> {
        self.state().members.iter().find(|m| m.id == id).map(|m| m.state)
    }

    /// Apply a probe outcome. Returns `(from, to)` when the state changed.
    pub fn record_probe(&self, id: &str, outcome: ProbeOutcome) -> Option<(HealthState, HealthState)> {
        let mut state = self.state();
        let member = state.members.iter_mut().find(|m| m.id == id)?;
        member.apply(outcome, Utc::now()).map(|from| (from, member.state))
    }

    /// Fail-fast demotion after a failed forward. Returns true when the
    /// member was routable before the call.
    pub fn demote(&self, id: &str, reason: impl Into<String>) -> bool {
        matches!(
            self.record_probe(id, ProbeOutcome::Unhealthy(reason.into())),
            Some((HealthState::Healthy, _))
        )
    }

    /// Pick the next healthy member, advancing the cursor.
    pub fn next_healthy(&self) -> Option<NodeDescriptor> {
        let mut guard = self.state();
        let ViewState { members, strategy } = &mut *guard;
        let candidates: Vec<&NodeDescriptor> = members.iter().filter(|m| m.state.is_healthy()).collect();
        let index = strategy.next_index(&candidates)?;
        candidates.get(index).map(|m| (*m).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn view(ids: &[&str]) -> ClusterView {
        let configs: Vec<BackendConfig> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| BackendConfig::new(*id, format!("127.0.0.1:{}", 9100 + i)))
            .collect();
        ClusterView::new(&configs)
    }

    fn mark_all_healthy(view: &ClusterView) {
        for m in view.members() {
            view.record_probe(&m.id, ProbeOutcome::Healthy);
        }
    }

    #[test]
    fn members_are_sorted_by_id() {
        let v = view(&["c", "a", "b"]);
        let ids: Vec<_> = v.members().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn unknown_members_are_not_routable() {
        let v = view(&["a", "b"]);
        assert_eq!(v.healthy_count(), 0);
        assert!(v.next_healthy().is_none());
    }

    #[test]
    fn n_calls_over_n_healthy_members_hit_each_once() {
        let v = view(&["a", "b", "c", "d"]);
        mark_all_healthy(&v);

        let mut hits: HashMap<String, usize> = HashMap::new();
        for _ in 0..4 {
            *hits.entry(v.next_healthy().unwrap().id).or_default() += 1;
        }
        assert_eq!(hits.len(), 4);
        assert!(hits.values().all(|&n| n == 1));
    }

    #[test]
    fn demoted_member_is_never_selected_next() {
        let v = view(&["a", "b", "c"]);
        mark_all_healthy(&v);

        let picked = v.next_healthy().unwrap();
        assert!(v.demote(&picked.id, "timed out"));
        for _ in 0..10 {
            assert_ne!(v.next_healthy().unwrap().id, picked.id);
        }
        assert_eq!(v.state_of(&picked.id), Some(HealthState::Unhealthy));
        assert!(!v.demote(&picked.id, "again"));
    }

    #[test]
    fn probe_success_restores_a_demoted_member() {
        let v = view(&["a"]);
        mark_all_healthy(&v);
        v.demote("a", "reset");
        assert!(v.next_healthy().is_none());

        assert_eq!(
            v.record_probe("a", ProbeOutcome::Healthy),
            Some((HealthState::Unhealthy, HealthState::Healthy))
        );
        assert_eq!(v.next_healthy().unwrap().id, "a");
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let v = view(&["a"]);
        assert!(v.record_probe("zzz", ProbeOutcome::Healthy).is_none());
        assert!(!v.demote("zzz", "x"));
        assert_eq!(v.len(), 1);
    }
}
