//! Replicated key-value cluster launcher.
//!
//! ```text
//!                         ┌──────────────────────┐
//!     client frames ─────▶│    load balancer     │── HEALTH_CHECK ──┐
//!                         │ round robin, healthy │                  │
//!                         └──────────┬───────────┘                  │
//!                                    │ frame relayed verbatim       │
//!              ┌─────────────────────┼─────────────────────┐        │
//!              ▼                     ▼                     ▼        │
//!        ┌──────────┐          ┌──────────┐          ┌──────────┐   │
//!        │ server_1 │◀────────▶│ server_2 │◀────────▶│ server_3 │◀──┘
//!        │  store   │ SYNC_DATA│  store   │ SYNC_DATA│  store   │
//!        └────┬─────┘          └────┬─────┘          └────┬─────┘
//!             ▼                     ▼                     ▼
//!     server_1_data.json    server_2_data.json    server_3_data.json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use replicated_kv::config::{load_config, validation::validate_config, ClusterConfig, ConfigError};
use replicated_kv::lifecycle::{launch, signals, Role, Shutdown};
use replicated_kv::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "replicated-kv")]
#[command(about = "Replicated key-value store behind a round-robin load balancer", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the load balancer
    Balancer,
    /// Run one storage node
    Backend {
        /// Node id as listed in the configuration
        #[arg(long)]
        id: String,
    },
    /// Run every storage node and the balancer in this process
    Cluster,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = ClusterConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            config
        }
    };

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "replicated-kv starting");
    tracing::info!(
        balancer = %config.balancer.bind_address,
        backends = config.backends.len(),
        data_dir = %config.storage.data_dir.display(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let role = match cli.command {
        Commands::Balancer => Role::Balancer,
        Commands::Backend { id } => Role::Backend(id),
        Commands::Cluster => Role::Cluster,
    };

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        signals::escalate(signal_shutdown, signals::wait_for_signal).await;
        tracing::warn!("Second signal received, exiting without draining");
        std::process::exit(130);
    });

    launch(config, role, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
