use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use swerve_zenoh_runtime::runtime::{self, RunOptions};

/// Swerve base runtime: zenoh motion commands in, steering and drive out
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Robot description (JSON); defaults to a 0.5 m square base
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port of the motor bus
    #[arg(short, long)]
    port: Option<String>,

    /// Run against simulated actuators
    #[arg(long)]
    sim: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();
    let options = RunOptions {
        config: args.config,
        port: args.port,
        simulate: args.sim,
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
