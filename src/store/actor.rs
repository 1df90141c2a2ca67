//! Single-owner access to a node's `Store`.
//!
//! The store lives on one dedicated thread. Connection tasks and the sync
//! engine send it commands over a bounded channel and await the reply on a
//! oneshot, so every `get`/`set`/`merge` runs to completion before the next
//! one starts and blocking file writes never stall the async workers.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::store::memory::Store;
use crate::store::record::{Record, Snapshot};

const COMMAND_BUFFER: usize = 256;

#[derive(Debug)]
enum StoreCommand {
    Get {
        key: String,
        respond_to: oneshot::Sender<Option<Record>>,
    },
    Set {
        key: String,
        value: String,
        respond_to: oneshot::Sender<Result<Record>>,
    },
    Merge {
        data: Snapshot,
        respond_to: oneshot::Sender<Result<usize>>,
    },
    Snapshot {
        respond_to: oneshot::Sender<Snapshot>,
    },
}

/// Cloneable handle to the owning store thread. The thread exits once the
/// last handle is dropped.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    node_id: Arc<str>,
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    pub fn spawn(store: Store) -> Result<Self> {
        let node_id: Arc<str> = Arc::from(store.node_id());
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        std::thread::Builder::new()
            .name(format!("store-{node_id}"))
            .spawn(move || run(store, rx))?;
        Ok(Self { node_id, tx })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub async fn get(&self, key: &str) -> Result<Option<Record>> {
        self.call(|respond_to| StoreCommand::Get {
            key: key.to_string(),
            respond_to,
        })
        .await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<Record> {
        self.call(|respond_to| StoreCommand::Set {
            key: key.to_string(),
            value: value.to_string(),
            respond_to,
        })
        .await?
    }

    pub async fn merge_incoming(&self, data: Snapshot) -> Result<usize> {
        self.call(|respond_to| StoreCommand::Merge { data, respond_to }).await?
    }

    pub async fn snapshot(&self) -> Result<Snapshot> {
        self.call(|respond_to| StoreCommand::Snapshot { respond_to }).await
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> StoreCommand) -> Result<T> {
        let (respond_to, reply) = oneshot::channel();
        self.tx
            .send(build(respond_to))
            .await
            .map_err(|_| Error::StoreUnavailable)?;
        reply.await.map_err(|_| Error::StoreUnavailable)
    }
}

fn run(mut store: Store, mut rx: mpsc::Receiver<StoreCommand>) {
    tracing::debug!(node_id = %store.node_id(), keys = store.len(), "Store task started");
    metrics::set_store_keys(store.node_id(), store.len());

    while let Some(command) = rx.blocking_recv() {
        match command {
            StoreCommand::Get { key, respond_to } => {
                let _ = respond_to.send(store.get(&key).cloned());
            }
            StoreCommand::Set { key, value, respond_to } => {
                let result = store.set(&key, &value);
                if let Err(e) = &result {
                    tracing::error!(node_id = %store.node_id(), key = %key, error = %e, "Write not persisted");
                }
                metrics::set_store_keys(store.node_id(), store.len());
                let _ = respond_to.send(result);
            }
            StoreCommand::Merge { data, respond_to } => {
                let incoming = data.len();
                let result = store.merge_incoming(data);
                match &result {
                    Ok(changed) => tracing::debug!(
                        node_id = %store.node_id(),
                        incoming,
                        changed,
                        "Merged peer snapshot"
                    ),
                    Err(e) => tracing::error!(node_id = %store.node_id(), error = %e, "Merge not persisted"),
                }
                metrics::set_store_keys(store.node_id(), store.len());
                let _ = respond_to.send(result);
            }
            StoreCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(store.snapshot());
            }
        }
    }

    tracing::debug!(node_id = %store.node_id(), "Store task stopped");
}
