use anyhow::Result;
use clap::{Parser, Subcommand};

use quakeland::ipc::{get_socket_path, send_message, ClientMessage, DaemonResponse};

#[derive(Parser)]
#[command(name = "quakectl")]
#[command(about = "quakeland client - send commands to running daemon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Daemon socket path
    #[arg(short, long)]
    socket: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Toggle a drop-down
    Toggle {
        /// Slot number
        #[arg(default_value_t = 1)]
        slot: u32,
    },
    /// Show daemon status
    Status,
    /// List configured slots
    List,
    /// Reload configuration
    Reload,
    /// Move drop-downs to another monitor
    Monitor {
        /// Monitor index, clamped to the connected monitors
        #[arg(allow_negative_numbers = true)]
        index: i64,
    },
}

impl Commands {
    fn into_message(self) -> ClientMessage {
        match self {
            Commands::Toggle { slot } => ClientMessage::Toggle { slot },
            Commands::Status => ClientMessage::Status,
            Commands::List => ClientMessage::List,
            Commands::Reload => ClientMessage::Reload,
            Commands::Monitor { index } => ClientMessage::SetMonitor { index },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let socket = cli.socket.unwrap_or_else(get_socket_path);

    match send_message(&socket, &cli.command.into_message()).await? {
        DaemonResponse::Success { message } => println!("✅ {message}"),
        DaemonResponse::Error { message } => {
            eprintln!("❌ {message}");
            std::process::exit(1);
        }
        DaemonResponse::Status {
            version,
            uptime_seconds,
            instances,
        } => {
            println!("📊 quakeland v{version}, up {uptime_seconds}s");
            if instances.is_empty() {
                println!("   no drop-downs started yet");
            }
            for instance in instances {
                println!(
                    "   [{}] {} {} {}",
                    instance.slot,
                    instance.app_id,
                    instance.state,
                    instance.window.as_deref().unwrap_or("-")
                );
            }
        }
        DaemonResponse::List { items } => {
            if items.is_empty() {
                println!("No slots configured");
            }
            for item in items {
                println!("{item}");
            }
        }
    }

    Ok(())
}
