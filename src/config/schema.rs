//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the cluster.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration shared by the balancer and every backend node.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Load balancer listener settings.
    pub balancer: BalancerConfig,

    /// Static membership: every backend node in the cluster.
    pub backends: Vec<BackendConfig>,

    /// Peer probing settings.
    pub health_check: HealthCheckConfig,

    /// Anti-entropy settings.
    pub sync: SyncConfig,

    /// Where nodes keep their store files.
    pub storage: StorageConfig,

    /// Wire framing limits.
    pub protocol: ProtocolConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            balancer: BalancerConfig::default(),
            backends: (1..=3)
                .map(|i| BackendConfig::new(format!("server_{i}"), format!("127.0.0.1:{}", 8000 + i)))
                .collect(),
            health_check: HealthCheckConfig::default(),
            sync: SyncConfig::default(),
            storage: StorageConfig::default(),
            protocol: ProtocolConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ClusterConfig {
    /// Look up a backend by node id.
    pub fn backend(&self, id: &str) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.id == id)
    }

    /// Every backend except `id`.
    pub fn peers_of(&self, id: &str) -> Vec<BackendConfig> {
        self.backends.iter().filter(|b| b.id != id).cloned().collect()
    }
}

/// Load balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Bind address (e.g., "127.0.0.1:8000").
    pub bind_address: String,

    /// Maximum concurrent client connections (backpressure).
    pub max_connections: usize,

    /// Deadline for one forwarded request/response exchange.
    pub forward_timeout_ms: u64,
}

impl BalancerConfig {
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            max_connections: 1024,
            forward_timeout_ms: 5_000,
        }
    }
}

/// One backend node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique node identifier; also names the node's store file.
    pub id: String,

    /// Listen address (e.g., "127.0.0.1:8001").
    pub address: String,

    /// Maximum concurrent connections to this node.
    #[serde(default = "default_max_backend_conns")]
    pub max_connections: usize,
}

impl BackendConfig {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            max_connections: default_max_backend_conns(),
        }
    }
}

fn default_max_backend_conns() -> usize {
    256
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Probe round interval in milliseconds.
    pub interval_ms: u64,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 5_000,
            timeout_ms: 3_000,
        }
    }
}

/// Anti-entropy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Enable periodic full-state pushes to healthy peers.
    pub enabled: bool,

    /// Sync round interval in milliseconds.
    pub interval_ms: u64,

    /// Per-push timeout in milliseconds.
    pub timeout_ms: u64,

    /// Upper bound on pushes in flight during one round.
    pub max_concurrent: usize,
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 10_000,
            timeout_ms: 5_000,
            max_concurrent: 4,
        }
    }
}

/// Store persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one `<node_id>_data.json` per node.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Wire protocol configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Largest accepted frame body in bytes.
    pub max_frame_length: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_frame_length: 8 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config: ClusterConfig = toml::from_str(
            r#"
            [health_check]
            interval_ms = 250

            [[backends]]
            id = "a"
            address = "127.0.0.1:7001"
            "#,
        )
        .unwrap();

        assert_eq!(config.health_check.interval_ms, 250);
        assert_eq!(config.health_check.timeout_ms, 3_000);
        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.backends[0].max_connections, 256);
        assert_eq!(config.balancer.bind_address, "127.0.0.1:8000");
    }

    #[test]
    fn default_cluster_has_three_backends() {
        let config = ClusterConfig::default();
        let ids: Vec<_> = config.backends.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["server_1", "server_2", "server_3"]);
        assert_eq!(config.backend("server_2").unwrap().address, "127.0.0.1:8002");
        assert_eq!(config.peers_of("server_2").len(), 2);
    }
}
