use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{AppState, Host, QuakeError, QuakeModeApp};
use crate::config::SettingKey;

/// Snapshot of one slot, as reported over IPC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotStatus {
    pub slot: u32,
    pub app_id: String,
    pub state: AppState,
    pub window: Option<String>,
}

/// One [`QuakeModeApp`] per configured slot, created on first toggle
pub struct QuakeModeManager {
    host: Host,
    apps: Mutex<BTreeMap<u32, QuakeModeApp>>,
}

impl QuakeModeManager {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            apps: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Toggle the drop-down bound to `slot`
    ///
    /// A dead instance, or one bound to an application the slot no longer
    /// names, is replaced by a fresh one before toggling.
    pub async fn toggle(&self, slot: u32) -> Result<(), QuakeError> {
        let app = self.instance_for(slot)?;
        app.toggle().await
    }

    fn instance_for(&self, slot: u32) -> Result<QuakeModeApp, QuakeError> {
        let app_id = self.host.settings.get_string(SettingKey::App(slot));
        if app_id.is_empty() {
            return Err(QuakeError::UnknownSlot(slot));
        }

        let mut apps = self.apps.lock();
        let reusable = apps
            .get(&slot)
            .filter(|app| app.state() != AppState::Dead && app.app_id() == app_id)
            .cloned();
        if let Some(app) = reusable {
            return Ok(app);
        }

        if let Some(stale) = apps.remove(&slot) {
            debug!("♻️  Replacing slot {} instance ({})", slot, stale.app_id());
            stale.destroy();
        }

        let app = QuakeModeApp::new(self.host.clone(), &app_id)?;
        apps.insert(slot, app.clone());
        Ok(app)
    }

    pub fn get(&self, slot: u32) -> Option<QuakeModeApp> {
        self.apps.lock().get(&slot).cloned()
    }

    /// Current state of every slot that has an instance
    pub fn status(&self) -> Vec<SlotStatus> {
        self.apps
            .lock()
            .iter()
            .map(|(slot, app)| SlotStatus {
                slot: *slot,
                app_id: app.app_id().to_string(),
                state: app.state(),
                window: app.window_id().map(|id| id.to_string()),
            })
            .collect()
    }

    /// Destroy every instance; used when the daemon shuts down
    pub fn destroy_all(&self) {
        let apps = std::mem::take(&mut *self.apps.lock());
        if apps.is_empty() {
            return;
        }
        info!("🧹 Destroying {} quake mode instance(s)", apps.len());
        for app in apps.into_values() {
            app.destroy();
        }
    }
}

impl Drop for QuakeModeManager {
    fn drop(&mut self) {
        self.destroy_all();
    }
}
