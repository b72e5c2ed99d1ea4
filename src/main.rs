//! `tn-manager`: bootstraps the transport-network control plane.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tn_control_plane::config::ManagerConfig;
use tn_control_plane::domain::ClusterName;
use tn_control_plane::observability::init_tracing;
use tn_control_plane::time_provider::production_time_provider;
use tn_control_plane::Manager;
use tracing::{error, info};

/// Transport-network control plane manager.
#[derive(Debug, Parser)]
#[command(name = "tn-manager", about = "Transport network control plane")]
struct Cli {
    /// Use the development config preset instead of production.
    #[arg(long)]
    dev: bool,

    /// An agent to register at startup, as `cluster_name=http://host:port`.
    /// May be passed multiple times.
    #[arg(long = "agent", value_parser = parse_agent)]
    agents: Vec<(ClusterName, String)>,
}

fn parse_agent(raw: &str) -> Result<(ClusterName, String), String> {
    let (name, endpoint) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected cluster_name=endpoint, got {raw:?}"))?;
    let cluster = ClusterName::try_new(name.to_string()).map_err(|e| e.to_string())?;
    Ok((cluster, endpoint.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = if cli.dev {
        ManagerConfig::development()
    } else {
        ManagerConfig::production()
    };
    config.validate().context("invalid manager configuration")?;

    info!(agents = cli.agents.len(), "starting tn-manager");

    let manager = Arc::new(Manager::new(config, production_time_provider()));

    for (cluster, endpoint) in cli.agents {
        if let Err(e) = manager.register_agent(cluster.clone(), endpoint).await {
            error!(%cluster, error = %e, "failed to register agent");
        }
    }

    let topology_manager = Arc::clone(&manager);
    let topology_handle = tokio::spawn(async move { topology_manager.run_topology_discovery_loop().await });

    let fault_manager = Arc::clone(&manager);
    let fault_handle = tokio::spawn(async move { fault_manager.run_fault_detection_loop().await });

    let metrics_manager = Arc::clone(&manager);
    let metrics_handle = tokio::spawn(async move { metrics_manager.run_metrics_cleanup_loop().await });

    let events_manager = Arc::clone(&manager);
    let events_handle = tokio::spawn(async move { events_manager.run_event_bus_loop().await });

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutting down");
    manager.stop();

    let _ = tokio::join!(topology_handle, fault_handle, metrics_handle, events_handle);
    Ok(())
}
