//! Hyprland host
//!
//! Hyprland has no per-window signals we can subscribe to from outside the
//! compositor, so the host polls `Clients::get`/`Monitors::get` and diffs the
//! snapshots into `windows-changed`, `mapped`, `size-changed`, `unmanaged`
//! and focus emissions. Actions go through `hyprctl dispatch`.
//!
//! Surfaces have no translation in Hyprland; the vertical offset is emulated
//! by moving the floating window relative to its placed position.

use anyhow::Result;
use async_trait::async_trait;
use hyprland::data::{Client, Clients, Monitors};
use hyprland::dispatch::{Dispatch, DispatchType};
use hyprland::shared::{HyprData, HyprDataActiveOptional, HyprDataVec};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::{
    AppHandle, AppRegistry, ExclusionId, ExclusionPredicate, ExclusionRegistry, Rect, Surface,
    SurfaceId, Window, WindowId, WindowManager,
};
use crate::config::ApplicationConfig;
use crate::core::signal::Signal;

/// Timeout duration for Hyprland API calls
const HYPRLAND_API_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Special workspace minimized drop-downs are parked on
const HIDDEN_WORKSPACE: &str = "special:quake";

const FALLBACK_AREA: Rect = Rect::new(0, 0, 1920, 1080);

/// Execute a blocking Hyprland API call with timeout
async fn with_hyprland_timeout<T, F>(operation: F) -> Result<T>
where
    F: FnOnce() -> Result<T, hyprland::error::HyprError> + Send + 'static,
    T: Send + 'static,
{
    timeout(HYPRLAND_API_TIMEOUT, tokio::task::spawn_blocking(operation))
        .await
        .map_err(|_| anyhow::anyhow!("Hyprland API call timeout after {:?}", HYPRLAND_API_TIMEOUT))?
        .map_err(|e| anyhow::anyhow!("Failed to spawn Hyprland task: {}", e))?
        .map_err(|e| anyhow::anyhow!("Hyprland API error: {}", e))
}

/// Run `hyprctl dispatch <dispatcher> <params>`
async fn hyprctl_dispatch(dispatcher: &'static str, params: String) -> Result<()> {
    trace!("📤 hyprctl dispatch {} {}", dispatcher, params);

    let output = timeout(
        HYPRLAND_API_TIMEOUT,
        tokio::task::spawn_blocking(move || {
            std::process::Command::new("hyprctl")
                .arg("dispatch")
                .arg(dispatcher)
                .arg(params)
                .output()
        }),
    )
    .await
    .map_err(|_| anyhow::anyhow!("hyprctl {} timeout after {:?}", dispatcher, HYPRLAND_API_TIMEOUT))???;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let reply = stdout.trim();
    if !output.status.success() || !(reply.is_empty() || reply == "ok") {
        anyhow::bail!("hyprctl dispatch {} failed: {}", dispatcher, reply);
    }
    Ok(())
}

/// Windows parked on a special workspace are out of sight and never focused
fn is_parked(workspace: &str) -> bool {
    workspace.starts_with("special")
}

/// Hyprland addresses are hex strings ("0x55d3c0a1b2c0")
fn parse_address(address: &str) -> Option<WindowId> {
    let hex = address.trim().trim_start_matches("0x");
    u64::from_str_radix(hex, 16).ok().map(WindowId)
}

/// Monitor rectangle in layout coordinates, accounting for scaling
fn logical_area(x: i32, y: i32, width: u16, height: u16, scale: f32) -> Rect {
    let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
    Rect::new(
        x,
        y,
        (f32::from(width) / scale).round() as i32,
        (f32::from(height) / scale).round() as i32,
    )
}

/// The parts of a Hyprland client the host tracks
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSnapshot {
    pub id: WindowId,
    pub address: String,
    pub class: String,
    pub frame: Rect,
    pub workspace: String,
    pub focused: bool,
}

impl ClientSnapshot {
    /// `active` is the address-derived id of Hyprland's active window
    fn from_client(client: &Client, active: Option<WindowId>) -> Option<Self> {
        let address = client.address.to_string();
        let id = parse_address(&address)?;
        let workspace = client.workspace.name.clone();
        Some(Self {
            id,
            address,
            class: client.class.clone(),
            frame: Rect::new(
                client.at.0.into(),
                client.at.1.into(),
                client.size.0.into(),
                client.size.1.into(),
            ),
            focused: active == Some(id) && !is_parked(&workspace),
            workspace,
        })
    }
}

/// State shared between the host and the windows it hands out
#[derive(Default)]
struct HostShared {
    monitors: RwLock<Vec<Rect>>,
    active: RwLock<Option<WindowId>>,
    /// Windows whose Hyprland animations are already disabled
    noanim: Mutex<HashSet<WindowId>>,
}

struct ClientState {
    frame: Rect,
    workspace: String,
}

pub struct HyprWindow {
    me: Weak<HyprWindow>,
    id: WindowId,
    address: String,
    class: String,
    shared: Arc<HostShared>,
    state: RwLock<ClientState>,
    hidden: AtomicBool,
    /// Last frame requested through `move_resize`; translation is relative to it
    placed: Mutex<Option<Rect>>,
    translation: Mutex<f64>,
    size_changed: Signal<()>,
    unmanaged: Signal<()>,
}

impl HyprWindow {
    fn new(client: &ClientSnapshot, shared: Arc<HostShared>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            id: client.id,
            address: client.address.clone(),
            class: client.class.clone(),
            shared,
            state: RwLock::new(ClientState {
                frame: client.frame,
                workspace: client.workspace.clone(),
            }),
            hidden: AtomicBool::new(is_parked(&client.workspace)),
            placed: Mutex::new(None),
            translation: Mutex::new(0.0),
            size_changed: Signal::new(),
            unmanaged: Signal::new(),
        })
    }

    fn update(&self, client: &ClientSnapshot) {
        let resized = {
            let mut state = self.state.write();
            let resized = state.frame.width != client.frame.width
                || state.frame.height != client.frame.height;
            state.frame = client.frame;
            state.workspace.clone_from(&client.workspace);
            resized
        };

        self.hidden.store(is_parked(&client.workspace), Ordering::Relaxed);

        if resized {
            trace!("📏 Window {} resized to {:?}", self.id, client.frame);
            self.size_changed.emit(());
        }
    }

    fn target(&self) -> String {
        format!("address:{}", self.address)
    }

    /// Float then pin: pinned floating windows show on every workspace
    ///
    /// `pin` toggles, so this must only run once per window.
    fn stick_dispatches(&self) -> [(&'static str, String); 2] {
        [("setfloating", self.target()), ("pin", self.target())]
    }

    async fn move_to(&self, x: i32, y: i32) -> Result<()> {
        hyprctl_dispatch("movewindowpixel", format!("exact {x} {y},{}", self.target())).await
    }
}

#[async_trait]
impl Window for HyprWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn surface(&self) -> Option<Arc<dyn Surface>> {
        self.me.upgrade().map(|w| w as Arc<dyn Surface>)
    }

    fn has_focus(&self) -> bool {
        *self.shared.active.read() == Some(self.id)
    }

    fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::Relaxed)
    }

    fn is_maximized(&self) -> bool {
        // Drop-downs are floated on stick and never tiled or maximized
        false
    }

    fn frame_rect(&self) -> Rect {
        self.state.read().frame
    }

    fn work_area_for_monitor(&self, monitor: i32) -> Rect {
        let monitors = self.shared.monitors.read();
        usize::try_from(monitor)
            .ok()
            .and_then(|index| monitors.get(index))
            .or_else(|| monitors.first())
            .copied()
            .unwrap_or(FALLBACK_AREA)
    }

    async fn activate(&self) -> Result<()> {
        if self.is_hidden() {
            hyprctl_dispatch("movetoworkspace", format!("e+0,{}", self.target())).await?;
            self.hidden.store(false, Ordering::Relaxed);
        }
        hyprctl_dispatch("focuswindow", self.target()).await?;
        *self.shared.active.write() = Some(self.id);
        Ok(())
    }

    async fn minimize(&self) -> Result<()> {
        hyprctl_dispatch(
            "movetoworkspacesilent",
            format!("{HIDDEN_WORKSPACE},{}", self.target()),
        )
        .await?;
        self.hidden.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn unmaximize(&self) -> Result<()> {
        Ok(())
    }

    async fn move_to_monitor(&self, monitor: i32) -> Result<()> {
        // Hyprland assigns the monitor from the global position move_resize sets
        trace!("Window {} targets monitor {}", self.id, monitor);
        Ok(())
    }

    async fn move_resize(&self, rect: Rect) -> Result<()> {
        *self.placed.lock() = Some(rect);
        let offset = self.translation.lock().round() as i32;

        hyprctl_dispatch(
            "resizewindowpixel",
            format!("exact {} {},{}", rect.width, rect.height, self.target()),
        )
        .await?;
        self.move_to(rect.x, rect.y + offset).await
    }

    async fn stick(&self) -> Result<()> {
        for (dispatcher, params) in self.stick_dispatches() {
            hyprctl_dispatch(dispatcher, params).await?;
        }
        Ok(())
    }

    async fn set_above(&self, above: bool) -> Result<()> {
        if above {
            // One-shot raise; Hyprland has no persistent keep-above state
            hyprctl_dispatch("alterzorder", format!("top,{}", self.target())).await?;
        } else {
            debug!("Window {} stays in normal stacking, nothing to undo", self.id);
        }
        Ok(())
    }

    fn size_changed(&self) -> &Signal<()> {
        &self.size_changed
    }

    fn unmanaged(&self) -> &Signal<()> {
        &self.unmanaged
    }
}

#[async_trait]
impl Surface for HyprWindow {
    fn id(&self) -> SurfaceId {
        SurfaceId(self.id.0)
    }

    fn width(&self) -> i32 {
        self.state.read().frame.width
    }

    fn height(&self) -> i32 {
        self.state.read().frame.height
    }

    fn is_mapped(&self) -> bool {
        // Clients only show up in `Clients::get` once mapped
        true
    }

    fn translation_y(&self) -> f64 {
        *self.translation.lock()
    }

    async fn set_translation_y(&self, value: f64) -> Result<()> {
        *self.translation.lock() = value;
        let base = self.placed.lock().unwrap_or_else(|| self.frame_rect());
        self.move_to(base.x, base.y + value.round() as i32).await
    }

    async fn set_clip(&self, clip: Option<Rect>) -> Result<()> {
        trace!("Clip {:?} ignored on {}", clip, self.id);
        Ok(())
    }

    async fn raise_to_top(&self) -> Result<()> {
        hyprctl_dispatch("alterzorder", format!("top,{}", self.target())).await
    }
}

/// An application from the `[applications]` table
pub struct HyprApp {
    id: String,
    config: ApplicationConfig,
    windows: RwLock<Vec<Arc<HyprWindow>>>,
    windows_changed: Signal<()>,
}

#[async_trait]
impl AppHandle for HyprApp {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open_new_window(&self) -> Result<()> {
        info!("🚀 Spawning '{}': {}", self.id, self.config.command);
        let command = self.config.command.clone();
        with_hyprland_timeout(move || Dispatch::call(DispatchType::Exec(&command))).await
    }

    fn window_count(&self) -> usize {
        self.windows.read().len()
    }

    fn windows(&self) -> Vec<Arc<dyn Window>> {
        self.windows
            .read()
            .iter()
            .map(|w| w.clone() as Arc<dyn Window>)
            .collect()
    }

    fn windows_changed(&self) -> &Signal<()> {
        &self.windows_changed
    }
}

/// Application registry and window manager backed by a running Hyprland
pub struct HyprlandHost {
    shared: Arc<HostShared>,
    applications: RwLock<BTreeMap<String, ApplicationConfig>>,
    apps: Mutex<HashMap<String, Arc<HyprApp>>>,
    windows: RwLock<HashMap<WindowId, Arc<HyprWindow>>>,
    mapped: Signal<SurfaceId>,
    focus_changed: Signal<Option<WindowId>>,
    exclusions: ExclusionRegistry,
}

impl HyprlandHost {
    pub fn new(applications: BTreeMap<String, ApplicationConfig>) -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::new(HostShared::default()),
            applications: RwLock::new(applications),
            apps: Mutex::new(HashMap::new()),
            windows: RwLock::new(HashMap::new()),
            mapped: Signal::new(),
            focus_changed: Signal::new(),
            exclusions: ExclusionRegistry::new(),
        })
    }

    pub async fn test_connection(&self) -> Result<()> {
        debug!("🧪 Testing Hyprland connection");
        let _monitors = with_hyprland_timeout(Monitors::get).await?;
        info!("✅ Hyprland connection test successful");
        Ok(())
    }

    /// Replace the application table; resolved handles are rebuilt on next use
    pub fn set_applications(&self, applications: BTreeMap<String, ApplicationConfig>) {
        *self.applications.write() = applications;
    }

    /// Start polling Hyprland until the host is dropped
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut failing = false;

            loop {
                interval.tick().await;
                let Some(host) = weak.upgrade() else {
                    break;
                };

                match host.poll().await {
                    Ok(()) if failing => {
                        info!("✅ Hyprland polling recovered");
                        failing = false;
                    }
                    Ok(()) => {}
                    Err(e) if !failing => {
                        warn!("⚠️  Hyprland poll failed: {}", e);
                        failing = true;
                    }
                    Err(e) => trace!("Hyprland poll still failing: {}", e),
                }
            }

            debug!("Hyprland poller stopped");
        })
    }

    async fn poll(&self) -> Result<()> {
        let clients = with_hyprland_timeout(Clients::get).await?.to_vec();
        let active = with_hyprland_timeout(Client::get_active)
            .await?
            .and_then(|client| parse_address(&client.address.to_string()));
        let mut monitors = with_hyprland_timeout(Monitors::get).await?.to_vec();
        monitors.sort_by_key(|m| m.id);

        let areas = monitors
            .iter()
            .map(|m| logical_area(m.x, m.y, m.width, m.height, m.scale))
            .collect();
        let snapshots = clients
            .iter()
            .filter_map(|client| ClientSnapshot::from_client(client, active))
            .collect();

        self.apply_snapshot(snapshots, areas);
        Ok(())
    }

    /// Diff a client/monitor snapshot against the tracked state and emit
    /// the resulting signals
    pub fn apply_snapshot(&self, clients: Vec<ClientSnapshot>, monitors: Vec<Rect>) {
        *self.shared.monitors.write() = monitors;

        let mut opened = Vec::new();
        let mut closed = Vec::new();
        {
            let mut windows = self.windows.write();
            let seen: HashSet<WindowId> = clients.iter().map(|c| c.id).collect();

            for client in &clients {
                match windows.get(&client.id) {
                    Some(window) => window.update(client),
                    None => {
                        let window = HyprWindow::new(client, self.shared.clone());
                        windows.insert(client.id, window.clone());
                        opened.push(window);
                    }
                }
            }

            let gone: Vec<WindowId> = windows
                .keys()
                .filter(|id| !seen.contains(id))
                .copied()
                .collect();
            for id in gone {
                if let Some(window) = windows.remove(&id) {
                    closed.push(window);
                }
            }
        }

        if !closed.is_empty() {
            let mut noanim = self.shared.noanim.lock();
            for window in &closed {
                noanim.remove(&window.id);
            }
        }

        let apps: Vec<Arc<HyprApp>> = self.apps.lock().values().cloned().collect();
        for app in apps {
            let changed = {
                let mut list = app.windows.write();
                let before = list.len();
                list.retain(|w| !closed.iter().any(|c| c.id == w.id));
                let mut changed = list.len() != before;
                for window in opened.iter().filter(|w| w.class == app.config.class) {
                    list.push(window.clone());
                    changed = true;
                }
                changed
            };
            if changed {
                debug!("🪟 '{}' now has {} window(s)", app.id, app.window_count());
                app.windows_changed.emit(());
            }
        }

        for window in &opened {
            debug!("🗺️  Window {} ({}) mapped", window.id, window.class);
            self.mapped.emit(SurfaceId(window.id.0));
        }
        for window in &closed {
            debug!("🚪 Window {} ({}) closed", window.id, window.class);
            window.unmanaged.emit(());
        }

        let active = clients
            .iter()
            .find(|c| c.focused && !is_parked(&c.workspace))
            .map(|c| c.id);
        let previous = std::mem::replace(&mut *self.shared.active.write(), active);
        if previous != active {
            trace!("🎯 Focus moved to {:?}", active);
            self.focus_changed.emit(active);
        }
    }

    async fn disable_animations(&self, surface: SurfaceId) {
        let id = WindowId(surface.0);
        let window = self.windows.read().get(&id).cloned();
        let Some(window) = window else {
            return;
        };
        if !self.shared.noanim.lock().insert(id) {
            return;
        }

        if let Err(e) = hyprctl_dispatch("setprop", format!("{} noanim 1", window.target())).await {
            warn!("⚠️  Failed to disable animations on {}: {}", id, e);
            self.shared.noanim.lock().remove(&id);
        }
    }
}

impl AppRegistry for HyprlandHost {
    fn resolve(&self, app_id: &str) -> Option<Arc<dyn AppHandle>> {
        let config = self.applications.read().get(app_id).cloned()?;

        let mut apps = self.apps.lock();
        if let Some(app) = apps.get(app_id).filter(|app| app.config == config) {
            return Some(app.clone() as Arc<dyn AppHandle>);
        }

        let existing: Vec<Arc<HyprWindow>> = self
            .windows
            .read()
            .values()
            .filter(|w| w.class == config.class)
            .cloned()
            .collect();

        debug!(
            "🔍 Resolved '{}' (class '{}', {} existing window(s))",
            app_id,
            config.class,
            existing.len()
        );

        let app = Arc::new(HyprApp {
            id: app_id.to_string(),
            config,
            windows: RwLock::new(existing),
            windows_changed: Signal::new(),
        });
        apps.insert(app_id.to_string(), app.clone());
        Some(app as Arc<dyn AppHandle>)
    }
}

#[async_trait]
impl WindowManager for HyprlandHost {
    fn monitor_count(&self) -> i32 {
        self.shared.monitors.read().len() as i32
    }

    fn mapped(&self) -> &Signal<SurfaceId> {
        &self.mapped
    }

    fn focus_changed(&self) -> &Signal<Option<WindowId>> {
        &self.focus_changed
    }

    async fn skip_next_effect(&self, surface: SurfaceId) {
        // Hyprland has no one-shot skip; animations stay off for drop-downs
        self.disable_animations(surface).await;
    }

    async fn kill_effects(&self, surface: SurfaceId) {
        self.disable_animations(surface).await;
    }

    fn register_exclusion(&self, predicate: ExclusionPredicate) -> ExclusionId {
        // Hyprland has no overview to filter; the predicate only answers
        // is_excluded queries
        debug!("🙈 Overview exclusion recorded, no compositor-side effect on Hyprland");
        self.exclusions.register(predicate)
    }

    fn unregister_exclusion(&self, id: ExclusionId) {
        self.exclusions.unregister(id);
    }

    fn is_excluded(&self, window: WindowId) -> bool {
        self.exclusions.is_excluded(window)
    }
}
