use anyhow::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::core::signal::Signal;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/hypr/quakeland.toml";

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub quake_mode: QuakeSettings,

    /// Slot number ("1", "2", ...) to application identifier
    #[serde(default)]
    pub apps: BTreeMap<String, String>,

    /// How the Hyprland host launches and recognises each application
    #[serde(default)]
    pub applications: BTreeMap<String, ApplicationConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ApplicationConfig {
    /// Command line handed to `hyprctl dispatch exec`
    pub command: String,

    /// Window class the launched application reports
    pub class: String,
}

/// Drop-down geometry and behaviour, the `[quake_mode]` table
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct QuakeSettings {
    /// Width in percent of the monitor work area (default: 100)
    #[serde(default = "default_width")]
    pub width: i64,

    /// Height in percent of the monitor work area (default: 50)
    #[serde(default = "default_height")]
    pub height: i64,

    /// Distance in pixels kept from the aligned edges (default: 0)
    #[serde(default)]
    pub gap: i64,

    /// "left", "center" or "right" (default: "center")
    #[serde(default = "default_halign")]
    pub halign: String,

    /// "top" or "bottom" (default: "top")
    #[serde(default = "default_valign")]
    pub valign: String,

    /// Target monitor index, clamped to the connected monitors when read
    #[serde(default)]
    pub monitor: i64,

    /// Show/hide animation time in seconds (default: 0.25)
    #[serde(default = "default_animation_time")]
    pub animation_time: f64,

    /// Hide the window as soon as focus moves elsewhere (default: false)
    #[serde(default)]
    pub focusout: bool,

    /// Keep the window above others (default: false)
    #[serde(default)]
    pub always_on_top: bool,

    /// Leave the window out of overview and alt-tab lists (default: false)
    #[serde(default)]
    pub hide_from_overview: bool,
}

fn default_width() -> i64 {
    100
}

fn default_height() -> i64 {
    50
}

fn default_halign() -> String {
    "center".to_string()
}

fn default_valign() -> String {
    "top".to_string()
}

fn default_animation_time() -> f64 {
    0.25
}

impl Default for QuakeSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            gap: 0,
            halign: default_halign(),
            valign: default_valign(),
            monitor: 0,
            animation_time: default_animation_time(),
            focusout: false,
            always_on_top: false,
            hide_from_overview: false,
        }
    }
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(path);
        info!("📄 Reading config from: {}", expanded_path);

        let content = fs::read_to_string(expanded_path.as_ref())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", expanded_path, e))?;

        let config = Self::parse(&content)?;
        debug!(
            "📋 Config loaded: {} app slots, {} applications",
            config.apps.len(),
            config.applications.len()
        );
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        for slot in config.apps.keys() {
            if slot.parse::<u32>().is_err() {
                warn!("⚠️  Ignoring app slot '{}': not a number", slot);
            }
        }

        Ok(config)
    }

    /// Application identifier bound to a slot, if any
    pub fn app_for_slot(&self, slot: u32) -> Option<&str> {
        self.apps
            .get(&slot.to_string())
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Width,
    Height,
    Gap,
    HAlign,
    VAlign,
    Monitor,
    AnimationTime,
    FocusOut,
    AlwaysOnTop,
    HideFromOverview,
    /// Application identifier of a slot
    App(u32),
}

impl SettingKey {
    /// Keys whose change moves or resizes the managed window
    pub fn affects_geometry(&self) -> bool {
        matches!(
            self,
            SettingKey::Width
                | SettingKey::Height
                | SettingKey::Gap
                | SettingKey::HAlign
                | SettingKey::VAlign
                | SettingKey::Monitor
        )
    }

    pub fn default_value(&self) -> SettingValue {
        self.read(&QuakeSettings::default())
    }

    fn read(&self, settings: &QuakeSettings) -> SettingValue {
        match self {
            SettingKey::Width => SettingValue::Int(settings.width),
            SettingKey::Height => SettingValue::Int(settings.height),
            SettingKey::Gap => SettingValue::Int(settings.gap),
            SettingKey::HAlign => SettingValue::String(settings.halign.clone()),
            SettingKey::VAlign => SettingValue::String(settings.valign.clone()),
            SettingKey::Monitor => SettingValue::Int(settings.monitor),
            SettingKey::AnimationTime => SettingValue::Double(settings.animation_time),
            SettingKey::FocusOut => SettingValue::Bool(settings.focusout),
            SettingKey::AlwaysOnTop => SettingValue::Bool(settings.always_on_top),
            SettingKey::HideFromOverview => SettingValue::Bool(settings.hide_from_overview),
            SettingKey::App(_) => SettingValue::String(String::new()),
        }
    }

    fn write(&self, settings: &mut QuakeSettings, value: SettingValue) -> Result<()> {
        match (self, value) {
            (SettingKey::Width, SettingValue::Int(v)) => settings.width = v,
            (SettingKey::Height, SettingValue::Int(v)) => settings.height = v,
            (SettingKey::Gap, SettingValue::Int(v)) => settings.gap = v,
            (SettingKey::HAlign, SettingValue::String(v)) => settings.halign = v,
            (SettingKey::VAlign, SettingValue::String(v)) => settings.valign = v,
            (SettingKey::Monitor, SettingValue::Int(v)) => settings.monitor = v,
            (SettingKey::AnimationTime, SettingValue::Double(v)) => settings.animation_time = v,
            (SettingKey::FocusOut, SettingValue::Bool(v)) => settings.focusout = v,
            (SettingKey::AlwaysOnTop, SettingValue::Bool(v)) => settings.always_on_top = v,
            (SettingKey::HideFromOverview, SettingValue::Bool(v)) => settings.hide_from_overview = v,
            (key, value) => {
                return Err(anyhow::anyhow!("Type mismatch writing {} = {:?}", key, value));
            }
        }
        Ok(())
    }

    const SCALAR_KEYS: [SettingKey; 10] = [
        SettingKey::Width,
        SettingKey::Height,
        SettingKey::Gap,
        SettingKey::HAlign,
        SettingKey::VAlign,
        SettingKey::Monitor,
        SettingKey::AnimationTime,
        SettingKey::FocusOut,
        SettingKey::AlwaysOnTop,
        SettingKey::HideFromOverview,
    ];
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingKey::Width => f.write_str("quake-mode-width"),
            SettingKey::Height => f.write_str("quake-mode-height"),
            SettingKey::Gap => f.write_str("quake-mode-gap"),
            SettingKey::HAlign => f.write_str("quake-mode-halign"),
            SettingKey::VAlign => f.write_str("quake-mode-valign"),
            SettingKey::Monitor => f.write_str("quake-mode-monitor"),
            SettingKey::AnimationTime => f.write_str("quake-mode-animation-time"),
            SettingKey::FocusOut => f.write_str("quake-mode-focusout"),
            SettingKey::AlwaysOnTop => f.write_str("quake-mode-always-on-top"),
            SettingKey::HideFromOverview => f.write_str("quake-mode-hide-from-overview"),
            SettingKey::App(slot) => write!(f, "app-{slot}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Int(i64),
    Double(f64),
    Bool(bool),
    String(String),
}

/// Typed key-value settings with change notification
///
/// The drop-down core only reads; writes come from the control surface.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: SettingKey) -> SettingValue;

    fn set(&self, key: SettingKey, value: SettingValue) -> Result<()>;

    /// Emits the key of every setting whose value changed
    fn changes(&self) -> &Signal<SettingKey>;

    fn get_int(&self, key: SettingKey) -> i64 {
        match self.get(key) {
            SettingValue::Int(v) => v,
            other => match mismatch(key, "int", &other) {
                SettingValue::Int(v) => v,
                _ => 0,
            },
        }
    }

    fn get_double(&self, key: SettingKey) -> f64 {
        match self.get(key) {
            SettingValue::Double(v) => v,
            SettingValue::Int(v) => v as f64,
            other => match mismatch(key, "double", &other) {
                SettingValue::Double(v) => v,
                _ => 0.0,
            },
        }
    }

    fn get_bool(&self, key: SettingKey) -> bool {
        match self.get(key) {
            SettingValue::Bool(v) => v,
            other => mismatch(key, "bool", &other) == SettingValue::Bool(true),
        }
    }

    fn get_string(&self, key: SettingKey) -> String {
        match self.get(key) {
            SettingValue::String(v) => v,
            other => match mismatch(key, "string", &other) {
                SettingValue::String(v) => v,
                _ => String::new(),
            },
        }
    }
}

/// Log a type mismatch and hand back the key's default
fn mismatch(key: SettingKey, expected: &str, found: &SettingValue) -> SettingValue {
    warn!(
        "⚠️  Setting '{}' read as {} but holds {:?}, using default",
        key, expected, found
    );
    key.default_value()
}

#[derive(Debug, Default)]
struct StoreState {
    settings: QuakeSettings,
    apps: BTreeMap<String, String>,
}

impl StoreState {
    fn get(&self, key: SettingKey) -> SettingValue {
        match key {
            SettingKey::App(slot) => {
                SettingValue::String(self.apps.get(&slot.to_string()).cloned().unwrap_or_default())
            }
            key => key.read(&self.settings),
        }
    }
}

/// Live settings backed by the TOML configuration file
pub struct TomlSettings {
    state: RwLock<StoreState>,
    changes: Signal<SettingKey>,
}

impl Default for TomlSettings {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl TomlSettings {
    pub fn new(config: &Config) -> Self {
        Self {
            state: RwLock::new(StoreState {
                settings: config.quake_mode.clone(),
                apps: config.apps.clone(),
            }),
            changes: Signal::new(),
        }
    }

    /// Replace the whole configuration, emitting one change per modified key
    pub fn apply(&self, config: &Config) -> Vec<SettingKey> {
        let changed = {
            let mut state = self.state.write();
            let mut changed: Vec<SettingKey> = SettingKey::SCALAR_KEYS
                .iter()
                .copied()
                .filter(|key| key.read(&state.settings) != key.read(&config.quake_mode))
                .collect();

            let slots: BTreeSet<&String> =
                state.apps.keys().chain(config.apps.keys()).collect();
            for slot in slots {
                if state.apps.get(slot) != config.apps.get(slot) {
                    if let Ok(n) = slot.parse::<u32>() {
                        changed.push(SettingKey::App(n));
                    }
                }
            }

            state.settings = config.quake_mode.clone();
            state.apps = config.apps.clone();
            changed
        };

        for key in &changed {
            debug!("🔧 Setting changed: {}", key);
            self.changes.emit(*key);
        }
        changed
    }

    pub fn snapshot(&self) -> QuakeSettings {
        self.state.read().settings.clone()
    }

    /// Configured slots in ascending order, skipping empty bindings
    pub fn slots(&self) -> Vec<(u32, String)> {
        let mut slots: Vec<(u32, String)> = self
            .state
            .read()
            .apps
            .iter()
            .filter(|(_, app_id)| !app_id.is_empty())
            .filter_map(|(slot, app_id)| slot.parse().ok().map(|n| (n, app_id.clone())))
            .collect();
        slots.sort_by_key(|(slot, _)| *slot);
        slots
    }
}

impl SettingsStore for TomlSettings {
    fn get(&self, key: SettingKey) -> SettingValue {
        self.state.read().get(key)
    }

    fn set(&self, key: SettingKey, value: SettingValue) -> Result<()> {
        let changed = {
            let mut state = self.state.write();
            if state.get(key) == value {
                false
            } else {
                match (key, value) {
                    (SettingKey::App(slot), SettingValue::String(app_id)) => {
                        state.apps.insert(slot.to_string(), app_id);
                    }
                    (key, value) => key.write(&mut state.settings, value)?,
                }
                true
            }
        };

        if changed {
            debug!("🔧 Setting written: {}", key);
            self.changes.emit(key);
        }
        Ok(())
    }

    fn changes(&self) -> &Signal<SettingKey> {
        &self.changes
    }
}
