//! procorg demo - walks through the registry operations end to end.
//!
//! # Usage
//!
//! ```bash
//! # Default walk-through, `sleep 30` as the long-running helper
//! procorg-demo
//!
//! # Use ping as the helper and show debug logs
//! procorg-demo --verbose --long-running ping localhost
//!
//! # Escalate to SIGKILL after 2s via a config file
//! procorg-demo --config procorg.toml
//! ```
//!
//! Pressing Ctrl-C at any point sends SIGINT to every tracked child before
//! the demo exits.

use anyhow::{Context, Result};
use clap::Parser;
use procorg::{ProcessRegistry, RegistryConfig, SpawnOptions};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "procorg-demo")]
#[command(about = "Walk through the procorg process registry", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds to wait before reading the listing's output
    #[arg(long, default_value = "3")]
    settle_secs: u64,

    /// Long-running helper command
    #[arg(long, num_args = 1.., default_values = ["sleep", "30"])]
    long_running: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = RegistryConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let mut children = ProcessRegistry::new().with_config(config);

    tokio::select! {
        result = walk_through(&mut children, &cli) => result?,
        _ = tokio::signal::ctrl_c() => {
            println!("Interrupted, signalling every child");
        }
    }

    // Records are left behind on purpose; kill_all only signals.
    children.kill_all();
    Ok(())
}

async fn walk_through(children: &mut ProcessRegistry, cli: &Cli) -> Result<()> {
    children
        .create(["ls"], "list", SpawnOptions::new().capture_output(true))
        .await
        .context("ls could not be started")?;

    if children
        .create(&cli.long_running, "helper", SpawnOptions::new())
        .await
        .is_none()
    {
        println!("Helper {:?} could not be started, continuing without it", cli.long_running);
    }

    // Finished processes stay listed until destroyed.
    println!("Created processes: {:?}", children.get_children());
    println!("PID: {:?}", children.get_pid("list"));

    tokio::time::sleep(Duration::from_secs(cli.settle_secs)).await;

    match children.get_output("list").await {
        Some(listing) => println!("List output:\n{}", listing),
        None => println!("List output not available yet"),
    }

    children.destroy("list").await;
    println!("Created processes: {:?}", children.get_children());

    println!("Helper running?: {}", children.is_running("helper"));
    let output = children.destroy("helper").await;
    println!("Helper output: {:?}", output);
    println!("Helper running?: {}", children.is_running("helper"));

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("procorg=debug,procorg_demo=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("procorg=warn,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
