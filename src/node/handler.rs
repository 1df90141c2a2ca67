//! Per-request dispatch for a storage node.
//!
//! # Responsibilities
//! - Decode a frame into a `Command`
//! - Run it against the node's store or health flag
//! - Always produce exactly one `Response`, errors included
//!
//! A malformed request gets an error response; the connection stays open.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::error::Result;
use crate::observability::metrics;
use crate::protocol::{
    Command, ErrorResponse, GetResponse, HealthResponse, NodeStatus, Request, Response, SetResponse,
    SyncAck,
};
use crate::store::StoreHandle;

#[derive(Debug, Clone)]
pub struct RequestHandler {
    store: StoreHandle,
    healthy: Arc<AtomicBool>,
}

impl RequestHandler {
    pub fn new(store: StoreHandle, healthy: Arc<AtomicBool>) -> Self {
        Self { store, healthy }
    }

    pub fn node_id(&self) -> &str {
        self.store.node_id()
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    /// Handle one request frame.
    pub async fn handle_frame(&self, frame: &[u8]) -> Response {
        let start = Instant::now();

        let command = match Request::decode(frame) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(node_id = %self.node_id(), error = %e, "Rejected request");
                metrics::record_request(self.node_id(), "INVALID", false, start);
                return Response::error(&e);
            }
        };

        let action = command.action();
        let result = self.execute(command).await;
        metrics::record_request(self.node_id(), action.as_str(), result.is_ok(), start);

        match result {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(node_id = %self.node_id(), action = %action, error = %e, "Request failed");
                Response::Error(ErrorResponse::timestamped(&e))
            }
        }
    }

    pub async fn execute(&self, command: Command) -> Result<Response> {
        let node_id = self.node_id();
        match command {
            Command::Get { key } => {
                let response = match self.store.get(&key).await? {
                    Some(record) => GetResponse::found(node_id, key, record),
                    None => GetResponse::not_found(node_id, key),
                };
                tracing::debug!(node_id, key = %response.key, found = response.is_found(), "GET");
                Ok(Response::Get(response))
            }
            Command::Set { key, value } => {
                let record = self.store.set(&key, &value).await?;
                tracing::debug!(node_id, key = %key, "SET");
                Ok(Response::Set(SetResponse::ok(key, &record)))
            }
            Command::HealthCheck => {
                let status = if self.is_healthy() {
                    NodeStatus::Healthy
                } else {
                    NodeStatus::Unhealthy
                };
                Ok(Response::Health(HealthResponse {
                    server_id: node_id.to_string(),
                    status,
                    timestamp: Utc::now(),
                }))
            }
            Command::SyncData { data } => {
                let received = data.len();
                let applied = self.store.merge_incoming(data).await?;
                tracing::debug!(node_id, received, applied, "SYNC_DATA merged");
                Ok(Response::Sync(SyncAck::ok()))
            }
        }
    }
}
