use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::config::{SettingKey, SettingValue, SettingsStore, TomlSettings};
use crate::core::hot_reload::HotReloadManager;
use crate::core::notifier::Notifier;
use crate::ipc::protocol::{get_socket_path, ClientMessage, DaemonResponse};
use crate::ipc::{read_frame, write_frame};
use crate::quake::{QuakeError, QuakeModeManager};

/// Everything a control command can touch
pub struct IpcServer {
    manager: Arc<QuakeModeManager>,
    settings: Arc<TomlSettings>,
    hot_reload: Arc<HotReloadManager>,
    notifier: Arc<dyn Notifier>,
    socket_path: String,
    start_time: Instant,
}

impl IpcServer {
    pub fn new(
        manager: Arc<QuakeModeManager>,
        settings: Arc<TomlSettings>,
        hot_reload: Arc<HotReloadManager>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            manager,
            settings,
            hot_reload,
            notifier,
            socket_path: get_socket_path(),
            start_time: Instant::now(),
        }
    }

    pub fn with_socket_path(mut self, socket_path: impl Into<String>) -> Self {
        self.socket_path = socket_path.into();
        self
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    /// Bind the socket and serve clients until the task is dropped
    pub async fn start(self: Arc<Self>) -> Result<()> {
        // Remove existing socket file if it exists
        if std::path::Path::new(&self.socket_path).exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("🔌 IPC server listening on: {}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_client(stream).await {
                            warn!("⚠️  Error handling client: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("❌ Failed to accept connection: {}", e);
                }
            }
        }
    }

    async fn handle_client(&self, mut stream: UnixStream) -> Result<()> {
        debug!("📞 New client connection");

        let message: ClientMessage = read_frame(&mut stream).await?;
        debug!("📨 Received message: {:?}", message);

        let response = self.process_message(message).await;
        write_frame(&mut stream, &response).await?;

        debug!("📤 Sent response: {:?}", response);
        Ok(())
    }

    pub async fn process_message(&self, message: ClientMessage) -> DaemonResponse {
        match message {
            ClientMessage::Toggle { slot } => {
                debug!("🔄 Processing toggle for slot {}", slot);
                match self.manager.toggle(slot).await {
                    Ok(()) => DaemonResponse::Success {
                        message: format!("Toggled slot {slot}"),
                    },
                    Err(e) => {
                        if !matches!(e, QuakeError::UnknownSlot(_)) {
                            self.notifier.notify(&e.to_string()).await;
                        }
                        DaemonResponse::Error {
                            message: e.to_string(),
                        }
                    }
                }
            }

            ClientMessage::Status => {
                debug!("📊 Processing status command");
                DaemonResponse::Status {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    uptime_seconds: self.start_time.elapsed().as_secs(),
                    instances: self.manager.status(),
                }
            }

            ClientMessage::List => {
                debug!("📋 Processing list command");
                let items = self
                    .settings
                    .slots()
                    .into_iter()
                    .map(|(slot, app_id)| format!("{slot}: {app_id}"))
                    .collect();
                DaemonResponse::List { items }
            }

            ClientMessage::Reload => {
                debug!("⚡ Processing reload command");
                match self.hot_reload.reload_now().await {
                    Ok(changed) => DaemonResponse::Success {
                        message: format!("Configuration reloaded, {} setting(s) changed", changed.len()),
                    },
                    Err(e) => DaemonResponse::Error {
                        message: e.to_string(),
                    },
                }
            }

            ClientMessage::SetMonitor { index } => {
                debug!("🖥️ Processing monitor change to {}", index);
                match self.settings.set(SettingKey::Monitor, SettingValue::Int(index)) {
                    Ok(()) => DaemonResponse::Success {
                        message: format!("Monitor set to {index}"),
                    },
                    Err(e) => DaemonResponse::Error {
                        message: e.to_string(),
                    },
                }
            }
        }
    }

    /// Remove the socket file left behind by [`IpcServer::start`]
    pub fn cleanup(&self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            debug!("Socket {} not removed: {}", self.socket_path, e);
        }
    }
}
