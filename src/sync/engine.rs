//! Anti-entropy push loop.
//!
//! # Responsibilities
//! - On a fixed interval, snapshot the local store once
//! - Push that snapshot to every peer this node currently sees as Healthy
//! - Log and skip peers that fail; never abort the round
//!
//! # Design Decisions
//! - Independent of the health loop; it only reads the latest view
//! - Pushes within a round run concurrently up to `max_concurrent`
//! - The receiving side merges by last-write-wins, so repeated pushes of
//!   the same snapshot are harmless

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::health::state::NodeDescriptor;
use crate::load_balancer::pool::ClusterView;
use crate::observability::metrics;
use crate::protocol::{Client, Request, SyncAck};
use crate::store::StoreHandle;

/// Outcome of one sync round.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub pushed: Vec<String>,
    pub failed: Vec<String>,
}

pub struct SyncEngine {
    store: StoreHandle,
    peers: Arc<ClusterView>,
    config: SyncConfig,
    client: Client,
}

impl SyncEngine {
    pub fn new(store: StoreHandle, peers: Arc<ClusterView>, config: SyncConfig, client: Client) -> Self {
        Self {
            store,
            peers,
            config,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!(node_id = %self.store.node_id(), "Sync engine disabled");
            return;
        }

        tracing::info!(
            node_id = %self.store.node_id(),
            interval_ms = self.config.interval_ms,
            max_concurrent = self.config.max_concurrent,
            "Sync engine starting"
        );

        let period = self.config.interval();
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sync_once().await {
                        tracing::error!(node_id = %self.store.node_id(), error = %e, "Sync round aborted");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!(node_id = %self.store.node_id(), "Sync engine received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run one round: push the current snapshot to each healthy peer.
    pub async fn sync_once(&self) -> Result<SyncReport> {
        let healthy = self.peers.healthy();
        if healthy.is_empty() {
            tracing::debug!(node_id = %self.store.node_id(), "No healthy peers to sync with");
            return Ok(SyncReport::default());
        }

        let request = Request::sync_data(self.store.snapshot().await?);
        let payload = request.to_bytes()?;
        let keys = request.data.as_ref().map_or(0, |d| d.len());

        let results: Vec<(NodeDescriptor, Result<()>)> = stream::iter(healthy)
            .map(|peer| {
                let payload = payload.clone();
                async move {
                    let result = self.push(&peer, payload).await;
                    (peer, result)
                }
            })
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        let mut report = SyncReport::default();
        for (peer, result) in results {
            match result {
                Ok(()) => {
                    tracing::debug!(node_id = %self.store.node_id(), peer = %peer.id, keys, "Synced with peer");
                    metrics::record_sync(self.store.node_id(), &peer.id, true);
                    report.pushed.push(peer.id);
                }
                Err(e) => {
                    tracing::warn!(node_id = %self.store.node_id(), peer = %peer.id, error = %e, "Sync with peer failed");
                    metrics::record_sync(self.store.node_id(), &peer.id, false);
                    report.failed.push(peer.id);
                }
            }
        }
        report.pushed.sort();
        report.failed.sort();
        Ok(report)
    }

    async fn push(&self, peer: &NodeDescriptor, payload: bytes::Bytes) -> Result<()> {
        let body = self.client.exchange(&peer.address, payload).await?;
        let ack: SyncAck = serde_json::from_slice(&body)
            .map_err(|_| Error::unreachable(&peer.id, "unexpected sync response"))?;
        if ack.is_ok() {
            Ok(())
        } else {
            Err(Error::unreachable(&peer.id, format!("sync rejected: {}", ack.status)))
        }
    }
}
