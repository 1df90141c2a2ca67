//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every member of a `ClusterView`
//! - Update member health state based on results

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::state::{HealthState, NodeDescriptor, ProbeOutcome};
use crate::load_balancer::pool::ClusterView;
use crate::observability::metrics;
use crate::protocol::{Client, HealthResponse, Request};

pub struct HealthMonitor {
    /// Who is probing; "balancer" or a node id. Used for logs and metrics.
    owner: String,
    view: Arc<ClusterView>,
    config: HealthCheckConfig,
    client: Client,
}

impl HealthMonitor {
    pub fn new(owner: impl Into<String>, view: Arc<ClusterView>, config: HealthCheckConfig, client: Client) -> Self {
        Self {
            owner: owner.into(),
            view,
            config,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!(owner = %self.owner, "Active health checks disabled");
            return;
        }

        tracing::info!(
            owner = %self.owner,
            interval_ms = self.config.interval_ms,
            timeout_ms = self.config.timeout_ms,
            members = self.view.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!(owner = %self.owner, "Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every member once, concurrently, and apply the outcomes.
    pub async fn check_all(&self) {
        let members = self.view.members();
        let outcomes = join_all(members.iter().map(|member| self.probe(member))).await;

        for (member, outcome) in members.iter().zip(outcomes) {
            let healthy = outcome.is_healthy();
            if let ProbeOutcome::Unhealthy(reason) = &outcome {
                tracing::debug!(owner = %self.owner, peer = %member.id, addr = %member.address, reason = %reason, "Health check failed");
            }

            match self.view.record_probe(&member.id, outcome) {
                Some((from, HealthState::Healthy)) => {
                    tracing::info!(owner = %self.owner, peer = %member.id, from = %from, "Peer is healthy");
                }
                Some((from, to)) => {
                    tracing::warn!(owner = %self.owner, peer = %member.id, from = %from, to = %to, "Peer marked unhealthy");
                }
                None => {}
            }
            metrics::record_probe(&self.owner, &member.id, healthy);
        }

        metrics::set_healthy_members(&self.owner, self.view.healthy_count());
    }

    /// Send one `HEALTH_CHECK` and classify the answer.
    pub async fn probe(&self, member: &NodeDescriptor) -> ProbeOutcome {
        match self
            .client
            .call::<HealthResponse>(&member.address, &Request::health_check())
            .await
        {
            Ok(resp) if resp.is_healthy() => ProbeOutcome::Healthy,
            Ok(resp) => ProbeOutcome::Unhealthy(format!("{} reports itself unhealthy", resp.server_id)),
            Err(e) => ProbeOutcome::Unhealthy(e.to_string()),
        }
    }
}
