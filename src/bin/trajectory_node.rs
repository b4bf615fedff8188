use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;
use trajectory_core::node::JsonLinesPublisher;
use trajectory_core::{
    NodeRegistry, PipelineConfig, TrajectoryNode, Waypoint, WaypointSnapshot,
};

/// Regenerates a trajectory from the current waypoints at a fixed rate and
/// prints each marker batch as a JSON line
#[derive(Parser)]
#[command(name = "trajectory_node")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON file with the initial waypoint list
    #[arg(short, long)]
    waypoints: Option<PathBuf>,

    /// Read replacement waypoint lists from stdin, one JSON array per line
    #[arg(long)]
    stdin: bool,

    /// Parameter override, e.g. `--param max_velocity=2.0`
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<(String, f64)>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_param(s: &str) -> std::result::Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {}", s))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("{}: {}", key, e))?;
    Ok((key.trim().to_string(), value))
}

fn load_waypoints(path: &Path) -> Result<Vec<Waypoint>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading waypoints from {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

async fn forward_stdin(snapshot: WaypointSnapshot) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match serde_json::from_str::<Vec<Waypoint>>(&line) {
                Ok(waypoints) => {
                    tracing::info!("Received {} waypoints", waypoints.len());
                    snapshot.replace(waypoints);
                }
                Err(e) => tracing::warn!("Ignoring malformed waypoint list: {}", e),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read stdin: {}", e);
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // Stdout carries the marker stream
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if !cli.params.is_empty() {
        let params: HashMap<String, f64> = cli.params.iter().cloned().collect();
        config.apply_params(&params)?;
    }
    tracing::info!(
        "Using parameters: dimension={}, optimize_order={}, v_max={}, a_max={}, rate={} Hz",
        config.generation.dimension,
        config.generation.optimize_order,
        config.generation.max_velocity,
        config.generation.max_acceleration,
        config.node.rate_hz
    );

    let snapshot = WaypointSnapshot::new();
    if let Some(path) = &cli.waypoints {
        snapshot.replace(load_waypoints(path)?);
    }
    if cli.stdin {
        tokio::spawn(forward_stdin(snapshot.clone()));
    }

    let publisher = Arc::new(JsonLinesPublisher::new(std::io::stdout()));
    let mut registry = NodeRegistry::new();
    registry.register(TrajectoryNode::new(
        "trajectory_node",
        config,
        snapshot,
        publisher,
    ));
    registry.init()?;
    tracing::info!("Trajectory node running");

    match cli.duration {
        Some(seconds) => tokio::time::sleep(Duration::from_secs_f64(seconds.max(0.0))).await,
        None => tokio::signal::ctrl_c().await?,
    }

    tracing::info!("Shutting down...");
    registry.shutdown()?;
    Ok(())
}
