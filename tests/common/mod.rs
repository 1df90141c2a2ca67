//! Shared utilities for cluster integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use replicated_kv::config::{BackendConfig, ClusterConfig};
use replicated_kv::lifecycle::Shutdown;
use replicated_kv::load_balancer::{BalancerServer, ClusterView};
use replicated_kv::net::Listener;
use replicated_kv::node::BackendServer;
use replicated_kv::protocol::codec::{framed, read_frame, write_frame};
use replicated_kv::protocol::{
    Client, Command, GetResponse, HealthResponse, NodeStatus, Request, Response,
};
use replicated_kv::store::StoreHandle;

pub const MAX_FRAME: usize = 8 * 1024 * 1024;

/// Config with intervals short enough for tests. Addresses are filled in later.
pub fn fast_config() -> ClusterConfig {
    let mut config = ClusterConfig::default();
    config.backends.clear();
    config.balancer.forward_timeout_ms = 500;
    config.health_check.interval_ms = 100;
    config.health_check.timeout_ms = 300;
    config.sync.interval_ms = 200;
    config.sync.timeout_ms = 1000;
    config
}

struct RunningNode {
    shutdown: Shutdown,
    task: JoinHandle<replicated_kv::Result<()>>,
    store: StoreHandle,
    peers: Arc<ClusterView>,
}

/// Balancer plus `n` real storage nodes, all on ephemeral ports.
pub struct TestCluster {
    pub config: ClusterConfig,
    pub balancer_addr: String,
    pub balancer_view: Arc<ClusterView>,
    balancer_shutdown: Shutdown,
    nodes: HashMap<String, RunningNode>,
    data_dir: TempDir,
}

impl TestCluster {
    pub async fn start(nodes: usize) -> Self {
        Self::start_with(nodes, |_| {}).await
    }

    pub async fn start_with(nodes: usize, tune: impl FnOnce(&mut ClusterConfig)) -> Self {
        let data_dir = tempfile::tempdir().unwrap();
        let mut config = fast_config();
        config.storage.data_dir = data_dir.path().to_path_buf();

        // Bind first so the config carries real addresses.
        let mut listeners = Vec::new();
        for i in 1..=nodes {
            let listener = Listener::bind("127.0.0.1:0", 64).await.unwrap();
            let id = format!("server_{i}");
            config
                .backends
                .push(BackendConfig::new(&id, listener.local_addr().unwrap().to_string()));
            listeners.push((id, listener));
        }
        let balancer_listener = Listener::bind("127.0.0.1:0", 64).await.unwrap();
        let balancer_addr = balancer_listener.local_addr().unwrap().to_string();
        config.balancer.bind_address = balancer_addr.clone();
        tune(&mut config);

        let mut running = HashMap::new();
        for (id, listener) in listeners {
            let server = BackendServer::open(&id, config.clone()).unwrap();
            let store = server.store();
            let peers = server.peers();
            let shutdown = Shutdown::new();
            let task = tokio::spawn(server.run(listener, shutdown.subscribe()));
            running.insert(
                id,
                RunningNode {
                    shutdown,
                    task,
                    store,
                    peers,
                },
            );
        }

        let balancer = BalancerServer::new(config.clone());
        let balancer_view = balancer.view();
        let balancer_shutdown = Shutdown::new();
        tokio::spawn(balancer.run(balancer_listener, balancer_shutdown.subscribe()));

        Self {
            config,
            balancer_addr,
            balancer_view,
            balancer_shutdown,
            nodes: running,
            data_dir,
        }
    }

    pub fn node_addr(&self, id: &str) -> String {
        self.config.backend(id).unwrap().address.clone()
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.config.backends.iter().map(|b| b.id.clone()).collect()
    }

    pub fn store(&self, id: &str) -> StoreHandle {
        self.nodes[id].store.clone()
    }

    pub fn peers_of(&self, id: &str) -> Arc<ClusterView> {
        Arc::clone(&self.nodes[id].peers)
    }

    pub fn data_dir(&self) -> &std::path::Path {
        self.data_dir.path()
    }

    /// Gracefully stop one storage node and wait for it to exit.
    pub async fn stop_node(&mut self, id: &str) {
        let node = self.nodes.remove(id).unwrap();
        node.shutdown.trigger();
        node.task.await.unwrap().unwrap();
    }

    /// Wait until the balancer and every node see all of their members healthy.
    pub async fn wait_all_healthy(&self) {
        let this = self;
        let ok = eventually(Duration::from_secs(5), move || async move {
            this.balancer_view.healthy_count() == this.balancer_view.len()
                && this
                    .nodes
                    .values()
                    .all(|n| n.peers.healthy_count() == n.peers.len())
        })
        .await;
        assert!(ok, "cluster did not become healthy");
    }

    pub async fn shutdown(self) {
        self.balancer_shutdown.trigger();
        for node in self.nodes.values() {
            node.shutdown.trigger();
        }
        for (_, node) in self.nodes {
            let _ = node.task.await;
        }
    }
}

pub fn client() -> Client {
    Client::new(Duration::from_secs(2))
}

pub async fn get(addr: &str, key: &str) -> GetResponse {
    client().call(addr, &Request::get(key)).await.unwrap()
}

pub async fn send(addr: &str, request: &Request) -> Response {
    let body = client().exchange(addr, request.to_bytes().unwrap()).await.unwrap();
    Response::from_bytes(&body).unwrap()
}

/// Poll `check` every 25ms until it holds or `timeout` passes.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// A listener that accepts connections and reads forever without answering.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut framed = framed(socket, MAX_FRAME);
                while let Ok(Some(_)) = read_frame(&mut framed).await {}
            });
        }
    });
    addr
}

/// A scripted node: answers HEALTH_CHECK from a switchable flag and every
/// other request with a fixed GET answer carrying its id.
pub struct FakeBackend {
    pub addr: SocketAddr,
    pub healthy: Arc<AtomicBool>,
    pub requests: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub async fn start(id: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let healthy = Arc::new(AtomicBool::new(true));
        let requests = Arc::new(AtomicUsize::new(0));

        let (flag, count) = (Arc::clone(&healthy), Arc::clone(&requests));
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let (flag, count) = (Arc::clone(&flag), Arc::clone(&count));
                tokio::spawn(async move {
                    let mut framed = framed(socket, MAX_FRAME);
                    while let Ok(Some(frame)) = read_frame(&mut framed).await {
                        let response = match Request::decode(&frame) {
                            Ok(Command::HealthCheck) => Response::Health(HealthResponse {
                                server_id: id.to_string(),
                                status: if flag.load(Ordering::SeqCst) {
                                    NodeStatus::Healthy
                                } else {
                                    NodeStatus::Unhealthy
                                },
                                timestamp: Utc::now(),
                            }),
                            _ => {
                                count.fetch_add(1, Ordering::SeqCst);
                                Response::Get(GetResponse::not_found(id, "fake".to_string()))
                            }
                        };
                        if write_frame(&mut framed, response.to_bytes().unwrap()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        Self {
            addr,
            healthy,
            requests,
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}
