//! Storage node server.
//!
//! # Responsibilities
//! - Accept connections and answer each framed request in order
//! - Run this node's peer health monitor and sync engine
//! - On shutdown: stop accepting, report unhealthy, drain connections

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::ClusterConfig;
use crate::error::Result;
use crate::health::HealthMonitor;
use crate::load_balancer::pool::ClusterView;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::node::handler::RequestHandler;
use crate::protocol::codec::{framed, read_frame, write_frame};
use crate::protocol::Client;
use crate::store::{SnapshotFile, Store, StoreHandle};
use crate::sync::SyncEngine;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct BackendServer {
    config: ClusterConfig,
    store: StoreHandle,
    peers: Arc<ClusterView>,
    healthy: Arc<AtomicBool>,
    tracker: ConnectionTracker,
}

impl BackendServer {
    /// Load `<data_dir>/<id>_data.json` and start the store for node `id`.
    pub fn open(id: &str, config: ClusterConfig) -> Result<Self> {
        let file = SnapshotFile::for_node(&config.storage.data_dir, id);
        let store = Store::open(id, file)?;
        tracing::info!(node_id = id, keys = store.len(), "Store loaded");
        Ok(Self::with_store(config, StoreHandle::spawn(store)?))
    }

    /// Serve an already running store. Peers are every configured backend
    /// other than the store's own node id.
    pub fn with_store(config: ClusterConfig, store: StoreHandle) -> Self {
        let peers = Arc::new(ClusterView::new(&config.peers_of(store.node_id())));
        Self {
            config,
            store,
            peers,
            healthy: Arc::new(AtomicBool::new(true)),
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn id(&self) -> &str {
        self.store.node_id()
    }

    pub fn store(&self) -> StoreHandle {
        self.store.clone()
    }

    /// This node's view of its peers.
    pub fn peers(&self) -> Arc<ClusterView> {
        Arc::clone(&self.peers)
    }

    /// The flag this node reports in HEALTH_CHECK answers.
    pub fn health_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.healthy)
    }

    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let addr = listener.local_addr()?;
        let max_frame_length = self.config.protocol.max_frame_length;
        tracing::info!(
            node_id = %self.id(),
            address = %addr,
            peers = self.peers.len(),
            "Backend node starting"
        );

        let monitor = HealthMonitor::new(
            self.id(),
            self.peers(),
            self.config.health_check.clone(),
            Client::new(self.config.health_check.timeout()).with_max_frame_length(max_frame_length),
        );
        let monitor_task = tokio::spawn(monitor.run(shutdown.resubscribe()));

        let sync = SyncEngine::new(
            self.store(),
            self.peers(),
            self.config.sync.clone(),
            Client::new(self.config.sync.timeout()).with_max_frame_length(max_frame_length),
        );
        let sync_task = tokio::spawn(sync.run(shutdown.resubscribe()));

        let handler = RequestHandler::new(self.store(), self.health_flag());

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote, permit)) => {
                        self.spawn_connection(stream, remote, permit, handler.clone(), max_frame_length);
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::warn!(node_id = %self.id(), error = %e, "Accept failed");
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!(node_id = %self.id(), "Backend node received shutdown signal");
                    break;
                }
            }
        }

        self.healthy.store(false, Ordering::SeqCst);
        drop(listener);
        let _ = tokio::join!(monitor_task, sync_task);

        if !self.tracker.wait_idle(DRAIN_TIMEOUT).await {
            tracing::warn!(
                node_id = %self.id(),
                remaining = self.tracker.active_count(),
                "Connections still open after drain timeout"
            );
        }
        tracing::info!(node_id = %self.id(), "Backend node stopped");
        Ok(())
    }

    fn spawn_connection(
        &self,
        stream: TcpStream,
        remote: SocketAddr,
        permit: ConnectionPermit,
        handler: RequestHandler,
        max_frame_length: usize,
    ) {
        let guard = self.tracker.track();
        let span = tracing::info_span!("conn", node_id = %self.id(), id = %guard.id(), remote = %remote);
        tokio::spawn(
            async move {
                if let Err(e) = serve_connection(stream, &handler, max_frame_length).await {
                    tracing::debug!(error = %e, "Connection ended with error");
                }
                drop(guard);
                drop(permit);
            }
            .instrument(span),
        );
    }
}

/// Answer frames on one connection until the peer closes it.
async fn serve_connection(stream: TcpStream, handler: &RequestHandler, max_frame_length: usize) -> Result<()> {
    let mut framed = framed(stream, max_frame_length);
    while let Some(frame) = read_frame(&mut framed).await? {
        let response = handler.handle_frame(&frame).await;
        write_frame(&mut framed, response.to_bytes()?).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::protocol::{GetResponse, HealthResponse, Request, SetResponse};

    fn single_node_config() -> ClusterConfig {
        let mut config = ClusterConfig::default();
        config.backends = vec![BackendConfig::new("server_1", "127.0.0.1:0")];
        config.health_check.enabled = false;
        config.sync.enabled = false;
        config
    }

    #[tokio::test]
    async fn serves_requests_and_reports_unhealthy_after_shutdown() {
        let store = StoreHandle::spawn(Store::in_memory("server_1")).unwrap();
        let server = BackendServer::with_store(single_node_config(), store);
        let flag = server.health_flag();
        assert!(server.peers().is_empty());

        let listener = Listener::bind("127.0.0.1:0", 8).await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(server.run(listener, rx));

        let client = Client::new(Duration::from_secs(2));
        let set: SetResponse = client.call(&addr, &Request::set("a", "1")).await.unwrap();
        assert_eq!(set.server_id, "server_1");
        let get: GetResponse = client.call(&addr, &Request::get("a")).await.unwrap();
        assert_eq!(get.value, "1");
        let health: HealthResponse = client.call(&addr, &Request::health_check()).await.unwrap();
        assert!(health.is_healthy());

        tx.send(()).unwrap();
        task.await.unwrap().unwrap();
        assert!(!flag.load(Ordering::SeqCst));
        assert!(client.exchange(&addr, Request::get("a").to_bytes().unwrap()).await.is_err());
    }

    #[tokio::test]
    async fn one_connection_carries_many_frames() {
        let store = StoreHandle::spawn(Store::in_memory("server_1")).unwrap();
        let server = BackendServer::with_store(single_node_config(), store);
        let listener = Listener::bind("127.0.0.1:0", 8).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (_tx, rx) = broadcast::channel(1);
        tokio::spawn(server.run(listener, rx));

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut framed = framed(stream, 1024 * 1024);
        for i in 0..3 {
            let request = Request::set("k", i.to_string()).to_bytes().unwrap();
            write_frame(&mut framed, request).await.unwrap();
            let body = read_frame(&mut framed).await.unwrap().unwrap();
            let response: SetResponse = serde_json::from_slice(&body).unwrap();
            assert_eq!(response.key, "k");
        }
    }
}
