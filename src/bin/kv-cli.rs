use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;
use uuid::Uuid;

use replicated_kv::protocol::{Client, Request};

#[derive(Parser)]
#[command(name = "kv-cli")]
#[command(about = "Client for the replicated key-value cluster", long_about = None)]
struct Cli {
    /// Balancer (or node) address
    #[arg(short, long, default_value = "127.0.0.1:8000")]
    address: String,

    /// Id attached to every request; random when omitted
    #[arg(long)]
    client_id: Option<String>,

    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a key
    Get { key: String },
    /// Write a key
    Set { key: String, value: String },
    /// Ask the addressed process for its health
    Health,
    /// Write five keys, then read them back
    Demo {
        /// Pause between requests
        #[arg(long, default_value_t = 1000)]
        pause_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new(Duration::from_millis(cli.timeout_ms));
    let client_id = cli
        .client_id
        .unwrap_or_else(|| format!("client_{}", Uuid::new_v4().simple()));

    match cli.command {
        Commands::Get { key } => {
            send(&client, &cli.address, Request::get(key).from_client(&client_id)).await?;
        }
        Commands::Set { key, value } => {
            send(&client, &cli.address, Request::set(key, value).from_client(&client_id)).await?;
        }
        Commands::Health => {
            send(&client, &cli.address, Request::health_check().from_client(&client_id)).await?;
        }
        Commands::Demo { pause_ms } => {
            let pause = Duration::from_millis(pause_ms);
            println!("=== Writing ===");
            for i in 0..5 {
                let request = Request::set(format!("key_{i}"), format!("value_{i}_from_{client_id}"));
                send(&client, &cli.address, request.from_client(&client_id)).await?;
                tokio::time::sleep(pause).await;
            }
            println!("\n=== Reading ===");
            for i in 0..5 {
                let request = Request::get(format!("key_{i}"));
                send(&client, &cli.address, request.from_client(&client_id)).await?;
                tokio::time::sleep(pause).await;
            }
        }
    }

    Ok(())
}

async fn send(client: &Client, address: &str, request: Request) -> Result<(), Box<dyn std::error::Error>> {
    let label = match &request.key {
        Some(key) => format!("{} {key}", request.action),
        None => request.action.clone(),
    };
    let json = client.call::<Value>(address, &request).await.map_err(|e| {
        eprintln!("{label}: error: {e}");
        e
    })?;
    println!("{label}: {}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transport_error_is_returned() {
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let client = Client::new(Duration::from_millis(500));
        let result = send(&client, &format!("127.0.0.1:{port}"), Request::get("k")).await;
        assert!(result.is_err());
    }
}
