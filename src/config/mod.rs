//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClusterConfig (validated, immutable)
//!     → cloned into every server and background loop
//! ```
//!
//! # Design Decisions
//! - Membership is static; a config change requires a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BackendConfig, BalancerConfig, ClusterConfig, HealthCheckConfig, ObservabilityConfig,
    ProtocolConfig, StorageConfig, SyncConfig,
};
