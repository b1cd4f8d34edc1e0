//! # Hub Node Binary
//!
//! Runs the telemetry and command loop against the simulation backend.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: Technic hub, nothing attached, in-process slots
//! hub_node
//!
//! # Config file, slots visible to a host process
//! hub_node --config config/hub.toml \
//!     --telemetry-path /dev/shm/hub_telemetry --command-path /dev/shm/hub_commands
//!
//! # Verbose JSON logs
//! hub_node -c config/hub.toml -v --json
//! ```
//!
//! Commands are read from stdin as 9-byte frames.

#![deny(warnings)]

use clap::Parser;
use hub_common::config::{ConfigError, LogLevel};
use hub_node::channel::StdinChannel;
use hub_node::clock::{Clock, SystemClock};
use hub_node::config::NodeConfig;
use hub_node::registry::DeviceRegistry;
use hub_node::simulation::SimulationBackend;
use hub_node::slots::{BroadcastBuffer, CommandSlot};
use hub_node::{ExitReason, NodeError, NodeResources, build_scheduler};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Hub Node - telemetry producers and command dispatch for a motion-controller hub
#[derive(Parser, Debug)]
#[command(name = "hub_node")]
#[command(version)]
#[command(about = "Cooperative telemetry and command loop for a motion-controller hub")]
#[command(long_about = None)]
struct Args {
    /// Path to the node configuration file (hub.toml). Defaults apply when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Back the telemetry buffer with this file (overrides the config)
    #[arg(long, value_name = "PATH")]
    telemetry_path: Option<PathBuf>,

    /// Back the command slot with this file (overrides the config)
    #[arg(long, value_name = "PATH")]
    command_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            setup_tracing(&args, LogLevel::default());
            error!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };
    setup_tracing(&args, config.shared.log_level);

    match run(config) {
        Ok(reason) => info!("Hub node stopped ({:?})", reason),
        Err(e) => {
            error!("Hub node failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_config(args: &Args) -> Result<NodeConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::load_validated(path)?,
        None => NodeConfig::default(),
    };
    if let Some(path) = &args.telemetry_path {
        config.shared_memory.telemetry_path = Some(path.clone());
    }
    if let Some(path) = &args.command_path {
        config.shared_memory.command_path = Some(path.clone());
    }
    Ok(config)
}

fn run(config: NodeConfig) -> Result<ExitReason, NodeError> {
    info!(
        "Hub node '{}' v{} starting ({:?})",
        config.shared.node_name,
        env!("CARGO_PKG_VERSION"),
        config.hub.kind
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let sim = SimulationBackend::new(
        config.hub.kind,
        &config.simulated_ports()?,
        config.simulation.battery_mv,
        Arc::clone(&clock),
    );
    let devices = DeviceRegistry::probe(config.hub.kind.ports(), &sim.probe_list());

    let broadcast = match &config.shared_memory.telemetry_path {
        Some(path) => BroadcastBuffer::mapped(path)?,
        None => BroadcastBuffer::in_memory()?,
    };
    let inbound = match &config.shared_memory.command_path {
        Some(path) => CommandSlot::mapped(path)?,
        None => CommandSlot::in_memory()?,
    };

    let resources = NodeResources::new(devices, sim.hub_services(), broadcast, inbound);
    let mut scheduler = build_scheduler(&config, resources, Box::new(StdinChannel::new()), clock)?;

    let running = scheduler.running_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    }) {
        warn!("Signal handler not installed: {}", e);
    }

    Ok(scheduler.run()?)
}

/// Setup tracing subscriber based on CLI arguments and config.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        "debug"
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
