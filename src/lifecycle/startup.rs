//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve which processes this invocation runs (balancer, one node, or all)
//! - Bind every listener the role needs before starting anything
//! - Run the servers until shutdown and surface the first failure
//!
//! # Design Decisions
//! - Fail fast: any bind or store-load error is fatal
//! - `Cluster` runs all nodes and the balancer in one process; each keeps
//!   its own store, view and background loops exactly as separate processes would

use std::fmt;

use futures_util::future::try_join_all;
use tokio::task::JoinHandle;

use crate::config::ClusterConfig;
use crate::error::{Error, Result};
use crate::lifecycle::shutdown::Shutdown;
use crate::load_balancer::BalancerServer;
use crate::net::Listener;
use crate::node::BackendServer;

/// What this process runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Balancer,
    Backend(String),
    Cluster,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Balancer => f.write_str("balancer"),
            Role::Backend(id) => write!(f, "backend {id}"),
            Role::Cluster => f.write_str("cluster"),
        }
    }
}

/// Bind, start and run everything `role` needs until `shutdown` fires.
pub async fn launch(config: ClusterConfig, role: Role, shutdown: &Shutdown) -> Result<()> {
    tracing::info!(role = %role, "Starting");

    let backend_ids: Vec<String> = match &role {
        Role::Balancer => Vec::new(),
        Role::Backend(id) => vec![id.clone()],
        Role::Cluster => config.backends.iter().map(|b| b.id.clone()).collect(),
    };

    let mut backend_listeners = Vec::with_capacity(backend_ids.len());
    for id in &backend_ids {
        let backend = config
            .backend(id)
            .ok_or_else(|| Error::UnknownNode(id.clone()))?;
        let listener = Listener::bind(&backend.address, backend.max_connections).await?;
        backend_listeners.push((id.clone(), listener));
    }

    let balancer_listener = if role == Role::Balancer || role == Role::Cluster {
        Some(Listener::bind(&config.balancer.bind_address, config.balancer.max_connections).await?)
    } else {
        None
    };

    let mut tasks: Vec<JoinHandle<Result<()>>> = Vec::new();
    for (id, listener) in backend_listeners {
        let server = BackendServer::open(&id, config.clone())?;
        tasks.push(tokio::spawn(server.run(listener, shutdown.subscribe())));
    }
    if let Some(listener) = balancer_listener {
        let server = BalancerServer::new(config.clone());
        tasks.push(tokio::spawn(server.run(listener, shutdown.subscribe())));
    }

    let results = try_join_all(tasks)
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    results.into_iter().collect::<Result<Vec<()>>>()?;

    tracing::info!(role = %role, "Stopped");
    Ok(())
}
