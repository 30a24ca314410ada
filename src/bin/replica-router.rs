//! Replica Router CLI
//!
//! Validates router topologies and probes endpoint reachability.
//! Routing itself is provided by the `replica_router` library crate.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use replica_router::{RouterConfig, RoutingDataSource, TcpConnector};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Replica Router - replication-aware connection routing
#[derive(Parser, Debug)]
#[command(name = "replica-router", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and validate a topology file, then print it
    Validate {
        /// Path to configuration file
        #[arg(env = "REPLICA_ROUTER_CONFIG", default_value = "configs/router.yaml")]
        config: String,
    },
    /// Open one connection to every endpoint and report the result
    Probe {
        /// Path to configuration file
        #[arg(env = "REPLICA_ROUTER_CONFIG", default_value = "configs/router.yaml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,replica_router=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Validate { config } => validate(&config),
        Command::Probe { config } => probe(&config).await,
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load(path: &str) -> Result<RouterConfig, Box<dyn std::error::Error>> {
    tracing::info!("Loading configuration from: {}", path);
    Ok(RouterConfig::from_file(path)?)
}

fn validate(path: &str) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load(path)?;

    println!("nesting: {:?}", config.nesting);
    for endpoint in &config.endpoints {
        println!(
            "{:<8} {:<16} {} (max_size {}, acquisition_timeout {})",
            endpoint.role.as_str(),
            endpoint.name,
            endpoint.url,
            endpoint.pool.max_size,
            humantime::format_duration(endpoint.pool.acquisition_timeout),
        );
    }
    println!("configuration OK ({} endpoints)", config.endpoints.len());

    Ok(true)
}

async fn probe(path: &str) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load(path)?;
    let ds = RoutingDataSource::from_config(&config, TcpConnector::new())?;

    let mut healthy = true;
    for endpoint in ds.registry().endpoints() {
        match endpoint.pool().acquire().await {
            Ok(_conn) => {
                tracing::info!(endpoint = %endpoint.kind(), name = endpoint.name(), "reachable");
                println!(
                    "{:<10} {:<8} {:<16} {} OK",
                    endpoint.kind().to_string(),
                    endpoint.kind().role().as_str(),
                    endpoint.name(),
                    endpoint.address()
                );
            }
            Err(e) => {
                healthy = false;
                tracing::warn!(endpoint = %endpoint.kind(), name = endpoint.name(), error = %e, "unreachable");
                println!(
                    "{:<10} {:<8} {:<16} {} FAILED: {}",
                    endpoint.kind().to_string(),
                    endpoint.kind().role().as_str(),
                    endpoint.name(),
                    endpoint.address(),
                    e
                );
            }
        }
    }

    ds.close();
    Ok(healthy)
}
