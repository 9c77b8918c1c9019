use anyhow::Result;
use notify::{Config as WatcherConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{Config, SettingKey, TomlSettings};

/// Hot reload event types
#[derive(Debug, Clone)]
pub enum ReloadEvent {
    ConfigChanged(PathBuf),
    /// New configuration applied; `changed` lists the settings that moved
    Applied {
        config: Box<Config>,
        changed: Vec<SettingKey>,
    },
    ValidationError(String),
}

/// Hot reload configuration
#[derive(Debug, Clone, serde::Deserialize)]
pub struct HotReloadConfig {
    /// Enable automatic file watching
    pub auto_reload: bool,
    /// Quiet period after the last file event before reloading
    pub debounce_ms: u64,
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            auto_reload: true,
            debounce_ms: 500, // 500ms debounce
        }
    }
}

/// Watches the configuration file and pushes changes into [`TomlSettings`]
///
/// A file that fails to parse leaves the live settings untouched.
pub struct HotReloadManager {
    config: HotReloadConfig,
    config_path: PathBuf,
    settings: Arc<TomlSettings>,
    watcher: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
    event_sender: broadcast::Sender<ReloadEvent>,
}

impl HotReloadManager {
    pub fn new(config_path: impl Into<PathBuf>, settings: Arc<TomlSettings>) -> Self {
        let (event_sender, _) = broadcast::channel(100);

        Self {
            config: HotReloadConfig::default(),
            config_path: config_path.into(),
            settings,
            watcher: None,
            task: None,
            event_sender,
        }
    }

    pub fn with_config(mut self, config: HotReloadConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Start watching the configuration file
    pub fn start(&mut self) -> Result<()> {
        if !self.config.auto_reload {
            info!("⏸️  Automatic config reload disabled");
            return Ok(());
        }

        info!("🔥 Starting hot reload manager");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if let Err(e) = tx.send(event) {
                        error!("Failed to send file watch event: {}", e);
                    }
                }
                Err(e) => error!("File watch error: {}", e),
            },
            WatcherConfig::default().with_poll_interval(Duration::from_millis(100)),
        )?;

        // Editors replace the file on save, so watch the directory
        let watched = self
            .config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        watcher.watch(&watched, RecursiveMode::NonRecursive)?;
        info!("👀 Watching directory: {:?}", watched);
        self.watcher = Some(watcher);

        let config_path = self.config_path.clone();
        let settings = Arc::clone(&self.settings);
        let event_sender = self.event_sender.clone();
        let debounce = Duration::from_millis(self.config.debounce_ms);

        self.task = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if !Self::concerns(&event, &config_path) {
                    continue;
                }

                // Wait for the burst of writes to settle
                tokio::time::sleep(debounce).await;
                while rx.try_recv().is_ok() {}

                info!("📁 Config file changed: {:?}", config_path);
                let _ = event_sender.send(ReloadEvent::ConfigChanged(config_path.clone()));
                if let Err(e) = Self::reload(&config_path, &settings, &event_sender).await {
                    warn!("⚠️  Config reload failed: {}", e);
                }
            }
            debug!("🔍 File watcher channel closed");
        }));

        Ok(())
    }

    fn concerns(event: &Event, config_path: &Path) -> bool {
        match event.kind {
            EventKind::Modify(_) | EventKind::Create(_) => event.paths.iter().any(|path| {
                path == config_path
                    || (path.file_name().is_some() && path.file_name() == config_path.file_name())
            }),
            _ => {
                debug!("🔍 Ignoring event type: {:?}", event.kind);
                false
            }
        }
    }

    /// Reload immediately, as the IPC `reload` command does
    pub async fn reload_now(&self) -> Result<Vec<SettingKey>> {
        Self::reload(&self.config_path, &self.settings, &self.event_sender).await
    }

    async fn reload(
        config_path: &Path,
        settings: &TomlSettings,
        event_sender: &broadcast::Sender<ReloadEvent>,
    ) -> Result<Vec<SettingKey>> {
        let config = match Config::load(&config_path.to_string_lossy()).await {
            Ok(config) => config,
            Err(e) => {
                warn!("⚠️  Keeping current settings: {}", e);
                let _ = event_sender.send(ReloadEvent::ValidationError(e.to_string()));
                return Err(e);
            }
        };

        let changed = settings.apply(&config);
        info!("✅ Configuration reloaded, {} setting(s) changed", changed.len());

        let _ = event_sender.send(ReloadEvent::Applied {
            config: Box::new(config),
            changed: changed.clone(),
        });
        Ok(changed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.event_sender.subscribe()
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if self.watcher.take().is_some() {
            info!("🛑 Hot reload stopped");
        }
    }
}

impl Drop for HotReloadManager {
    fn drop(&mut self) {
        self.stop();
    }
}
