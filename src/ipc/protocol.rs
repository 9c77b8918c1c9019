use serde::{Deserialize, Serialize};

use crate::quake::manager::SlotStatus;

/// Messages sent from client to daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Toggle the drop-down bound to a slot
    Toggle { slot: u32 },
    /// Get daemon status
    Status,
    /// List configured slots
    List,
    /// Reload configuration
    Reload,
    /// Change the monitor drop-downs appear on
    SetMonitor { index: i64 },
}

/// Responses sent from daemon to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DaemonResponse {
    /// Command executed successfully
    Success { message: String },
    /// Command failed with error
    Error { message: String },
    /// Status information
    Status {
        version: String,
        uptime_seconds: u64,
        instances: Vec<SlotStatus>,
    },
    /// List of available items
    List { items: Vec<String> },
}

impl ClientMessage {
    /// Parse command line arguments into a ClientMessage
    pub fn from_args(command: &str, args: &[String]) -> anyhow::Result<Self> {
        match command {
            "toggle" => {
                let slot = match args.first() {
                    Some(slot) => slot
                        .parse()
                        .map_err(|_| anyhow::anyhow!("Invalid slot '{}'", slot))?,
                    None => 1,
                };
                Ok(ClientMessage::Toggle { slot })
            }
            "monitor" => {
                if let Some(index) = args.first() {
                    Ok(ClientMessage::SetMonitor {
                        index: index
                            .parse()
                            .map_err(|_| anyhow::anyhow!("Invalid monitor index '{}'", index))?,
                    })
                } else {
                    Err(anyhow::anyhow!("Monitor command requires an index"))
                }
            }
            "reload" => Ok(ClientMessage::Reload),
            "status" => Ok(ClientMessage::Status),
            "list" => Ok(ClientMessage::List),
            _ => Err(anyhow::anyhow!("Unknown command: {}", command)),
        }
    }
}

/// IPC socket path - uses runtime directory or falls back to /tmp
pub fn get_socket_path() -> String {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    format!("{runtime_dir}/quakeland.sock")
}
