use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use quakeland::config::DEFAULT_CONFIG_PATH;
use quakeland::Daemon;

#[derive(Parser)]
#[command(name = "quakeland")]
#[command(about = "Quake-style drop-down windows for Hyprland")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("quakeland={log_level}"))
        .with_target(false)
        .init();

    info!("🦀 Starting quakeland v{}", env!("CARGO_PKG_VERSION"));

    // Verify Hyprland is running
    if std::env::var("HYPRLAND_INSTANCE_SIGNATURE").is_err() {
        error!("❌ Hyprland not detected. HYPRLAND_INSTANCE_SIGNATURE not set.");
        std::process::exit(1);
    }

    // Create and run daemon
    match Daemon::new(&cli.config).await {
        Ok(mut daemon) => {
            if let Err(e) = daemon.run().await {
                error!("❌ Daemon error: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to create daemon: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
