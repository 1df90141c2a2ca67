//! Balancer front end.
//!
//! # Responsibilities
//! - Accept client connections; each frame is routed on its own
//! - Pick the next healthy backend and relay the frame verbatim
//! - Answer with a timestamped error when nothing can serve the request
//! - Run the balancer's own health monitor over all backends

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::ClusterConfig;
use crate::error::{Error, Result};
use crate::health::passive::report_forward_failure;
use crate::health::HealthMonitor;
use crate::load_balancer::pool::ClusterView;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::protocol::codec::{framed, read_frame, write_frame};
use crate::protocol::{Client, ErrorResponse, Response};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Routing half of the balancer, shared by every connection task.
#[derive(Debug, Clone)]
pub struct Forwarder {
    view: Arc<ClusterView>,
    client: Client,
}

impl Forwarder {
    pub fn new(view: Arc<ClusterView>, client: Client) -> Self {
        Self { view, client }
    }

    /// Forward one request frame and return the frame to send back.
    pub async fn route(&self, frame: Bytes) -> Bytes {
        let Some(backend) = self.view.next_healthy() else {
            tracing::warn!("No healthy backend available");
            return error_frame(&Error::NoHealthyBackend);
        };

        let start = Instant::now();
        match self.client.exchange(&backend.address, frame).await {
            Ok(body) => {
                metrics::record_forward(&backend.id, true, start);
                tracing::debug!(backend = %backend.id, bytes = body.len(), "Forwarded request");
                body
            }
            Err(e) => {
                metrics::record_forward(&backend.id, false, start);
                report_forward_failure(&self.view, &backend, &e);
                error_frame(&format!("error communicating with backend {}: {e}", backend.id))
            }
        }
    }
}

fn error_frame(message: &dyn std::fmt::Display) -> Bytes {
    Response::Error(ErrorResponse::timestamped(message))
        .to_bytes()
        .unwrap_or_else(|_| Bytes::from_static(br#"{"error":"internal error"}"#))
}

pub struct BalancerServer {
    config: ClusterConfig,
    view: Arc<ClusterView>,
    tracker: ConnectionTracker,
}

impl BalancerServer {
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            view: Arc::new(ClusterView::new(&config.backends)),
            config,
            tracker: ConnectionTracker::new(),
        }
    }

    /// The balancer's view of the backends.
    pub fn view(&self) -> Arc<ClusterView> {
        Arc::clone(&self.view)
    }

    pub fn forwarder(&self) -> Forwarder {
        let client = Client::new(self.config.balancer.forward_timeout())
            .with_max_frame_length(self.config.protocol.max_frame_length);
        Forwarder::new(self.view(), client)
    }

    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let addr = listener.local_addr()?;
        let max_frame_length = self.config.protocol.max_frame_length;
        tracing::info!(
            address = %addr,
            backends = self.view.len(),
            forward_timeout_ms = self.config.balancer.forward_timeout_ms,
            "Load balancer starting"
        );

        let monitor = HealthMonitor::new(
            "balancer",
            self.view(),
            self.config.health_check.clone(),
            Client::new(self.config.health_check.timeout()).with_max_frame_length(max_frame_length),
        );
        let monitor_task = tokio::spawn(monitor.run(shutdown.resubscribe()));

        let forwarder = self.forwarder();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote, permit)) => {
                        self.spawn_connection(stream, remote, permit, forwarder.clone(), max_frame_length);
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Load balancer received shutdown signal");
                    break;
                }
            }
        }

        drop(listener);
        let _ = monitor_task.await;

        if !self.tracker.wait_idle(DRAIN_TIMEOUT).await {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Connections still open after drain timeout"
            );
        }
        tracing::info!("Load balancer stopped");
        Ok(())
    }

    fn spawn_connection(
        &self,
        stream: TcpStream,
        remote: SocketAddr,
        permit: ConnectionPermit,
        forwarder: Forwarder,
        max_frame_length: usize,
    ) {
        let guard = self.tracker.track();
        let span = tracing::info_span!("conn", id = %guard.id(), remote = %remote);
        tokio::spawn(
            async move {
                if let Err(e) = relay_connection(stream, &forwarder, max_frame_length).await {
                    tracing::debug!(error = %e, "Client connection ended with error");
                }
                drop(guard);
                drop(permit);
            }
            .instrument(span),
        );
    }
}

async fn relay_connection(stream: TcpStream, forwarder: &Forwarder, max_frame_length: usize) -> Result<()> {
    let mut framed = framed(stream, max_frame_length);
    while let Some(frame) = read_frame(&mut framed).await? {
        let reply = forwarder.route(frame).await;
        write_frame(&mut framed, reply).await?;
    }
    Ok(())
}
