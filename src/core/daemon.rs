use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::animation::TweenAnimator;
use crate::config::{Config, TomlSettings};
use crate::core::hot_reload::{HotReloadManager, ReloadEvent};
use crate::core::notifier::{DesktopNotifier, Notifier};
use crate::host::HyprlandHost;
use crate::ipc::IpcServer;
use crate::quake::{Host, QuakeModeManager};

pub struct Daemon {
    config_path: String,
    settings: Arc<TomlSettings>,
    hyprland: Arc<HyprlandHost>,
    manager: Arc<QuakeModeManager>,
    notifier: Arc<dyn Notifier>,
}

impl Daemon {
    pub async fn new(config_path: &str) -> Result<Self> {
        info!("📄 Loading configuration from: {}", config_path);
        let config = Config::load(config_path).await?;

        info!("🔌 Connecting to Hyprland IPC");
        let hyprland = HyprlandHost::new(config.applications.clone());

        info!("🔧 Initializing quake mode manager");
        let settings = Arc::new(TomlSettings::new(&config));
        let manager = Arc::new(QuakeModeManager::new(Host::new(
            hyprland.clone(),
            hyprland.clone(),
            Arc::new(TweenAnimator::new()),
            settings.clone(),
        )));

        Ok(Self {
            config_path: shellexpand::tilde(config_path).into_owned(),
            settings,
            hyprland,
            manager,
            notifier: Arc::new(DesktopNotifier::default()),
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("🚀 Starting quakeland daemon");

        // Test Hyprland connection
        if let Err(e) = self.hyprland.test_connection().await {
            error!("❌ Failed to connect to Hyprland: {}", e);
            return Err(e);
        }
        info!("✅ Connected to Hyprland successfully");

        let poller = self.hyprland.start();

        let mut hot_reload = HotReloadManager::new(&self.config_path, self.settings.clone());
        if let Err(e) = hot_reload.start() {
            warn!("⚠️  Config watching unavailable: {}", e);
        }
        let mut reloads = hot_reload.subscribe();
        let hot_reload = Arc::new(hot_reload);

        // Start IPC server
        let ipc_server = Arc::new(IpcServer::new(
            self.manager.clone(),
            self.settings.clone(),
            hot_reload,
            self.notifier.clone(),
        ));
        let ipc_task = tokio::spawn({
            let ipc_server = ipc_server.clone();
            async move {
                if let Err(e) = ipc_server.start().await {
                    error!("❌ IPC server error: {}", e);
                }
            }
        });

        let mut terminate = unix_signal(SignalKind::terminate())?;

        info!("🔄 Starting event loop");
        loop {
            tokio::select! {
                event = reloads.recv() => match event {
                    Ok(ReloadEvent::Applied { config, changed }) => {
                        debug!("🔧 Reload applied, {} setting(s) changed", changed.len());
                        self.hyprland.set_applications(config.applications);
                    }
                    Ok(ReloadEvent::ValidationError(message)) => {
                        self.notifier
                            .notify(&format!("Configuration not reloaded: {message}"))
                            .await;
                    }
                    Ok(ReloadEvent::ConfigChanged(_)) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("⚠️  Missed {} reload events", skipped);
                    }
                    Err(RecvError::Closed) => {
                        debug!("Reload channel closed");
                        break;
                    }
                },

                // Handle shutdown signal
                _ = signal::ctrl_c() => {
                    info!("🛑 Received shutdown signal");
                    break;
                }
                _ = terminate.recv() => {
                    info!("🛑 Received SIGTERM");
                    break;
                }
            }
        }

        info!("👋 Shutting down quakeland");
        self.manager.destroy_all();
        ipc_task.abort();
        poller.abort();
        ipc_server.cleanup();
        Ok(())
    }
}
