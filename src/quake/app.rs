use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::geometry::{clamp_monitor, Placement};
use super::{Host, QuakeError};
use crate::animation::{EasingFunction, Tween};
use crate::config::SettingKey;
use crate::core::launch::{LaunchAttempt, LAUNCH_TIMEOUT};
use crate::core::signal::Subscription;
use crate::host::{AppHandle, ExclusionId, Rect, Surface, Window, WindowId};

/// How long first placement waits for the new surface to be mapped
const MAP_TIMEOUT: Duration = LAUNCH_TIMEOUT;

/// How long first placement waits for the host to report the new size
const SIZE_SETTLE_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AppState {
    #[default]
    Initial,
    Ready,
    Starting,
    Running,
    Dead,
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppState::Initial => "initial",
            AppState::Ready => "ready",
            AppState::Starting => "starting",
            AppState::Running => "running",
            AppState::Dead => "dead",
        };
        f.write_str(name)
    }
}

enum ToggleAction {
    Launch(Arc<dyn AppHandle>),
    Hide,
    Show,
    Activate(Arc<dyn Window>),
    Ignore,
}

#[derive(Default)]
struct Shared {
    state: AppState,
    app: Option<Arc<dyn AppHandle>>,
    window: Option<Weak<dyn Window>>,
    /// True while a show/hide (or first placement) is in flight
    transitioning: bool,
    /// Settings and unmanaged watchers, aborted on destroy
    listeners: Vec<JoinHandle<()>>,
    focus_out: Option<JoinHandle<()>>,
    exclusion: Option<ExclusionId>,
    /// Entry in the host's claim set, released on destroy
    claimed: Option<WindowId>,
}

impl Shared {
    fn window(&self) -> Option<Arc<dyn Window>> {
        self.window.as_ref().and_then(Weak::upgrade)
    }
}

struct Inner {
    app_id: String,
    host: Host,
    shared: Mutex<Shared>,
    /// Flips to true once, on destroy; cancels an in-flight launch
    dead: watch::Sender<bool>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let shared = self.shared.get_mut();
        for handle in shared.listeners.drain(..) {
            handle.abort();
        }
        if let Some(handle) = shared.focus_out.take() {
            handle.abort();
        }
        if let Some(id) = shared.exclusion.take() {
            self.host.wm.unregister_exclusion(id);
        }
        if let Some(window) = shared.claimed.take() {
            self.host.claims.release(window);
        }
    }
}

/// Drop-down controller for a single application window
///
/// Cheap to clone; clones share the same instance. Must be created inside a
/// Tokio runtime since it keeps background listeners for settings and window
/// signals.
#[derive(Clone)]
pub struct QuakeModeApp {
    inner: Arc<Inner>,
}

impl QuakeModeApp {
    /// Resolve `app_id` and bind the settings listeners
    pub fn new(host: Host, app_id: &str) -> Result<Self, QuakeError> {
        let app = host.registry.resolve(app_id).ok_or_else(|| {
            warn!("⚠️  Application '{}' not found", app_id);
            QuakeError::Resolution {
                app_id: app_id.to_string(),
            }
        })?;

        let (dead, _) = watch::channel(false);
        let this = Self {
            inner: Arc::new(Inner {
                app_id: app_id.to_string(),
                host,
                shared: Mutex::new(Shared::default()),
                dead,
            }),
        };

        let listener = this.spawn_settings_listener();
        {
            let mut shared = this.inner.shared.lock();
            shared.app = Some(app);
            shared.listeners.push(listener);
            shared.state = AppState::Ready;
        }

        info!("🪟 Quake mode ready for '{}'", app_id);
        Ok(this)
    }

    pub fn app_id(&self) -> &str {
        &self.inner.app_id
    }

    pub fn state(&self) -> AppState {
        self.inner.shared.lock().state
    }

    pub fn is_transitioning(&self) -> bool {
        self.inner.shared.lock().transitioning
    }

    /// Identity of the managed window, if one is adopted and still alive
    pub fn window_id(&self) -> Option<WindowId> {
        self.inner.shared.lock().window().map(|w| w.id())
    }

    /// Launch, show, hide or raise depending on the current state
    ///
    /// Toggles arriving while a launch or an animation is in flight are
    /// ignored. A failed launch destroys the instance before the error is
    /// returned.
    pub async fn toggle(&self) -> Result<(), QuakeError> {
        match self.decide_toggle() {
            ToggleAction::Launch(app) => {
                let this = self.clone();
                let dead = self.inner.dead.subscribe();
                let outcome = run_to_completion(async move {
                    tokio::select! {
                        biased;
                        outcome = this.launch(app) => outcome,
                        _ = destroyed(dead) => {
                            debug!("🛑 Launch of '{}' cancelled by destroy", this.inner.app_id);
                            Ok(())
                        }
                    }
                })
                .await;
                if outcome.is_err() && self.state() == AppState::Starting {
                    self.destroy();
                }
                outcome
            }
            ToggleAction::Hide => {
                self.hide().await;
                Ok(())
            }
            ToggleAction::Show => {
                self.show().await;
                Ok(())
            }
            ToggleAction::Activate(window) => {
                debug!("🎯 '{}' visible but unfocused, activating", self.inner.app_id);
                if let Err(e) = window.activate().await {
                    warn!("⚠️  Failed to activate window: {}", e);
                }
                Ok(())
            }
            ToggleAction::Ignore => {
                debug!(
                    "⏭️  Toggle ignored for '{}' in state {}",
                    self.inner.app_id,
                    self.state()
                );
                Ok(())
            }
        }
    }

    fn decide_toggle(&self) -> ToggleAction {
        let mut shared = self.inner.shared.lock();
        let state = shared.state;
        match state {
            AppState::Ready => match shared.app.clone() {
                Some(app) => {
                    shared.state = AppState::Starting;
                    ToggleAction::Launch(app)
                }
                None => ToggleAction::Ignore,
            },
            AppState::Running => match shared.window() {
                Some(window) if window.has_focus() => ToggleAction::Hide,
                Some(window) if window.is_hidden() => ToggleAction::Show,
                Some(window) => ToggleAction::Activate(window),
                None => {
                    drop(shared);
                    warn!("⚠️  Managed window of '{}' is gone", self.inner.app_id);
                    self.destroy();
                    ToggleAction::Ignore
                }
            },
            AppState::Initial | AppState::Starting | AppState::Dead => ToggleAction::Ignore,
        }
    }

    /// Release every listener and reference; safe to call repeatedly
    pub fn destroy(&self) {
        let (listeners, focus_out, exclusion, claimed) = {
            let mut shared = self.inner.shared.lock();
            if shared.state == AppState::Dead {
                return;
            }
            shared.state = AppState::Dead;
            shared.app = None;
            shared.window = None;
            (
                std::mem::take(&mut shared.listeners),
                shared.focus_out.take(),
                shared.exclusion.take(),
                shared.claimed.take(),
            )
        };
        self.inner.dead.send_replace(true);

        if let Some(window) = claimed {
            self.inner.host.claims.release(window);
        }

        if let Some(id) = exclusion {
            self.inner.host.wm.unregister_exclusion(id);
        }
        if let Some(handle) = focus_out {
            handle.abort();
        }
        // May include the task running this call; abort only lands at its
        // next suspension point.
        for handle in listeners {
            handle.abort();
        }

        info!("💀 Quake mode for '{}' destroyed", self.inner.app_id);
    }

    async fn launch(&self, app: Arc<dyn AppHandle>) -> Result<(), QuakeError> {
        info!("🚀 Launching '{}'", self.inner.app_id);

        let claims = self.inner.host.claims.clone();
        let outcome = match LaunchAttempt::begin(app, claims, LAUNCH_TIMEOUT).await {
            Ok(attempt) => attempt.outcome().await,
            Err(e) => Err(e),
        };

        let window = match outcome {
            Ok(window) => window,
            Err(e) => {
                error!("❌ Launch of '{}' failed: {}", self.inner.app_id, e);
                self.destroy();
                return Err(e);
            }
        };

        if !self.adopt(&window) {
            debug!("Instance destroyed while launching, leaving window {} alone", window.id());
            return Ok(());
        }

        self.apply_always_on_top().await;
        self.apply_overview_exclusion();
        self.first_place(window).await;
        Ok(())
    }

    /// Take ownership of a freshly launched and claimed window
    ///
    /// The claim is released again when the instance is no longer starting.
    fn adopt(&self, window: &Arc<dyn Window>) -> bool {
        let unmanaged = window.unmanaged().subscribe();

        let mut shared = self.inner.shared.lock();
        if shared.state != AppState::Starting {
            drop(shared);
            self.inner.host.claims.release(window.id());
            return false;
        }

        shared.window = Some(Arc::downgrade(window));
        shared.claimed = Some(window.id());
        shared.state = AppState::Running;
        // First placement owns the window until its opening show completes
        shared.transitioning = true;
        let watcher = self.spawn_unmanaged_watcher(unmanaged);
        shared.listeners.push(watcher);

        info!("✅ '{}' adopted window {}", self.inner.app_id, window.id());
        true
    }

    async fn first_place(&self, window: Arc<dyn Window>) {
        let wm = &self.inner.host.wm;

        if let Err(e) = window.stick().await {
            warn!("⚠️  Failed to stick window {}: {}", window.id(), e);
        }

        let Some(surface) = window.surface() else {
            warn!("⚠️  Window {} has no surface, skipping first placement", window.id());
            self.end_transition();
            return;
        };

        // Zero-height clip keeps the first frame from flashing on screen
        let hidden = Rect::new(0, 0, surface.width(), 0);
        if let Err(e) = surface.set_clip(Some(hidden)).await {
            warn!("⚠️  Failed to clip surface {}: {}", surface.id(), e);
        }

        let mapped = wm.mapped().subscribe();
        if surface.is_mapped() {
            drop(mapped);
        } else {
            let own = surface.id();
            match timeout(MAP_TIMEOUT, mapped.once_where(move |id| *id == own)).await {
                Ok(Some(_)) => debug!("🗺️  Surface {} mapped", own),
                Ok(None) => warn!("⚠️  Map signal closed before surface {} appeared", own),
                Err(_) => warn!("⚠️  Surface {} not mapped within {:?}", own, MAP_TIMEOUT),
            }
        }

        wm.kill_effects(surface.id()).await;

        let size_changed = window.size_changed().subscribe();
        if let Some(target) = self.place().await {
            self.wait_for_size(&window, target, size_changed).await;
        }

        if let Err(e) = surface.set_clip(None).await {
            warn!("⚠️  Failed to unclip surface {}: {}", surface.id(), e);
        }

        self.end_transition();
        self.show().await;
    }

    async fn wait_for_size(
        &self,
        window: &Arc<dyn Window>,
        target: Rect,
        size_changed: Subscription<()>,
    ) {
        if window.frame_rect() == target {
            debug!("Window {} already at {:?}", window.id(), target);
            return;
        }

        if timeout(SIZE_SETTLE_TIMEOUT, size_changed.once()).await.is_err() {
            warn!(
                "⚠️  Window {} did not report its new size within {:?}, showing anyway",
                window.id(),
                SIZE_SETTLE_TIMEOUT
            );
        }
    }

    /// Slide the managed window in; no-op unless running and idle
    pub async fn show(&self) {
        let Some((window, surface)) = self.begin_transition() else {
            debug!("⏭️  Show skipped for '{}'", self.inner.app_id);
            return;
        };

        let this = self.clone();
        let shown = tokio::spawn(async move { this.animate_in(window, surface).await }).await;
        if let Err(e) = shown {
            error!("❌ Show of '{}' aborted: {}", self.inner.app_id, e);
            self.end_transition();
        }
    }

    /// Slide the managed window out and minimize it; no-op unless running and idle
    pub async fn hide(&self) {
        let Some((window, surface)) = self.begin_transition() else {
            debug!("⏭️  Hide skipped for '{}'", self.inner.app_id);
            return;
        };

        let this = self.clone();
        let hidden = tokio::spawn(async move { this.animate_out(window, surface).await }).await;
        if let Err(e) = hidden {
            error!("❌ Hide of '{}' aborted: {}", self.inner.app_id, e);
            self.end_transition();
        }
    }

    fn begin_transition(&self) -> Option<(Arc<dyn Window>, Arc<dyn Surface>)> {
        let mut shared = self.inner.shared.lock();
        if shared.state != AppState::Running || shared.transitioning {
            return None;
        }
        let window = shared.window()?;
        let surface = window.surface()?;
        shared.transitioning = true;
        Some((window, surface))
    }

    fn end_transition(&self) {
        self.inner.shared.lock().transitioning = false;
    }

    async fn animate_in(&self, window: Arc<dyn Window>, surface: Arc<dyn Surface>) {
        let host = &self.inner.host;
        let placement = Placement::from_settings(host.settings.as_ref());
        let height = match self.place().await {
            Some(rect) => rect.height,
            None => surface.height(),
        };

        if let Err(e) = surface.raise_to_top().await {
            warn!("⚠️  Failed to raise surface {}: {}", surface.id(), e);
        }

        let offset = placement.valign.offscreen_offset(height, placement.gap);
        if let Err(e) = surface.set_translation_y(offset).await {
            warn!("⚠️  Failed to pre-position surface {}: {}", surface.id(), e);
        }

        host.wm.skip_next_effect(surface.id()).await;

        let was_maximized = window.is_maximized();
        if let Err(e) = window.activate().await {
            warn!("⚠️  Failed to activate window {}: {}", window.id(), e);
        }
        if was_maximized {
            if let Err(e) = window.unmaximize().await {
                warn!("⚠️  Failed to unmaximize window {}: {}", window.id(), e);
            }
        }

        debug!("⬇️  Showing '{}'", self.inner.app_id);
        host.animator
            .animate(
                surface,
                Tween {
                    target: 0.0,
                    duration: self.animation_duration(),
                    easing: EasingFunction::EaseOutQuad,
                },
            )
            .await;

        self.end_transition();

        if host.settings.get_bool(SettingKey::FocusOut) {
            self.arm_focus_out(window.id());
        }
    }

    async fn animate_out(&self, window: Arc<dyn Window>, surface: Arc<dyn Surface>) {
        let host = &self.inner.host;
        self.disarm_focus_out();

        let placement = Placement::from_settings(host.settings.as_ref());
        let target = placement.valign.offscreen_offset(surface.height(), placement.gap);

        debug!("⬆️  Hiding '{}'", self.inner.app_id);
        host.animator
            .animate(
                surface.clone(),
                Tween {
                    target,
                    duration: self.animation_duration(),
                    easing: EasingFunction::EaseInQuad,
                },
            )
            .await;

        host.wm.skip_next_effect(surface.id()).await;
        if let Err(e) = window.minimize().await {
            warn!("⚠️  Failed to minimize window {}: {}", window.id(), e);
        }
        // Back at rest so an external unminimize shows it in place
        if let Err(e) = surface.set_translation_y(0.0).await {
            warn!("⚠️  Failed to reset translation of {}: {}", surface.id(), e);
        }

        self.end_transition();
    }

    /// Move and resize the managed window to the configured geometry
    ///
    /// Returns the applied frame, or `None` when there is no window.
    pub async fn place(&self) -> Option<Rect> {
        let window = self.inner.shared.lock().window()?;
        let host = &self.inner.host;

        let monitor = self.monitor();
        let area = window.work_area_for_monitor(monitor);
        let rect = Placement::from_settings(host.settings.as_ref()).compute(area);

        debug!(
            "📐 Placing window {} on monitor {} at {:?}",
            window.id(),
            monitor,
            rect
        );

        if let Err(e) = window.move_to_monitor(monitor).await {
            warn!("⚠️  Failed to move window {} to monitor {}: {}", window.id(), monitor, e);
        }
        if let Err(e) = window.move_resize(rect).await {
            warn!("⚠️  Failed to position window {}: {}", window.id(), e);
        }

        Some(rect)
    }

    /// Configured monitor index, clamped to the connected monitors
    pub fn monitor(&self) -> i32 {
        let host = &self.inner.host;
        clamp_monitor(
            host.settings.get_int(SettingKey::Monitor),
            host.wm.monitor_count(),
        )
    }

    fn animation_duration(&self) -> Duration {
        let seconds = self.inner.host.settings.get_double(SettingKey::AnimationTime);
        if seconds.is_finite() && seconds > 0.0 {
            Duration::from_secs_f64(seconds)
        } else {
            Duration::ZERO
        }
    }

    pub async fn apply_always_on_top(&self) {
        let window = self.inner.shared.lock().window();
        let Some(window) = window else {
            return;
        };
        let above = self.inner.host.settings.get_bool(SettingKey::AlwaysOnTop);
        if let Err(e) = window.set_above(above).await {
            warn!("⚠️  Failed to set always-on-top={} on {}: {}", above, window.id(), e);
        }
    }

    /// Register or drop the overview exclusion to match the setting
    fn apply_overview_exclusion(&self) {
        let host = &self.inner.host;
        let wanted = host.settings.get_bool(SettingKey::HideFromOverview);

        let mut shared = self.inner.shared.lock();
        if shared.state == AppState::Dead {
            return;
        }
        match (wanted, shared.window().map(|w| w.id()), shared.exclusion) {
            (true, Some(own), None) => {
                let id = host.wm.register_exclusion(Arc::new(move |w: WindowId| w == own));
                shared.exclusion = Some(id);
                debug!("🙈 Window {} hidden from overview", own);
            }
            (false, _, Some(id)) => {
                host.wm.unregister_exclusion(id);
                shared.exclusion = None;
                debug!("👁️ Overview exclusion removed for '{}'", self.inner.app_id);
            }
            _ => {}
        }
    }

    fn arm_focus_out(&self, own: WindowId) {
        let focus = self.inner.host.wm.focus_changed().subscribe();
        let weak = Arc::downgrade(&self.inner);

        let handle = tokio::spawn(async move {
            if focus.once_where(move |focused| *focused != Some(own)).await.is_none() {
                return;
            }
            if let Some(inner) = weak.upgrade() {
                let app = QuakeModeApp { inner };
                debug!("👋 Focus left '{}', hiding", app.inner.app_id);
                app.inner.shared.lock().focus_out.take();
                app.hide().await;
            }
        });

        let mut shared = self.inner.shared.lock();
        if shared.state == AppState::Dead {
            handle.abort();
            return;
        }
        if let Some(previous) = shared.focus_out.replace(handle) {
            previous.abort();
        }
    }

    fn disarm_focus_out(&self) {
        if let Some(handle) = self.inner.shared.lock().focus_out.take() {
            handle.abort();
        }
    }

    fn spawn_settings_listener(&self) -> JoinHandle<()> {
        let mut changes = self.inner.host.settings.changes().subscribe();
        let weak = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            while let Some(key) = changes.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let app = QuakeModeApp { inner };

                if key.affects_geometry() {
                    debug!("🔧 {} changed, re-placing '{}'", key, app.inner.app_id);
                    app.place().await;
                } else if key == SettingKey::AlwaysOnTop {
                    app.apply_always_on_top().await;
                } else if key == SettingKey::HideFromOverview {
                    app.apply_overview_exclusion();
                }
            }
        })
    }

    fn spawn_unmanaged_watcher(&self, unmanaged: Subscription<()>) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            unmanaged.once().await;
            if let Some(inner) = weak.upgrade() {
                info!("🚪 Window of '{}' unmanaged", inner.app_id);
                QuakeModeApp { inner }.destroy();
            }
        })
    }
}

/// Resolves once the instance behind `dead` has been destroyed
async fn destroyed(mut dead: watch::Receiver<bool>) {
    while !*dead.borrow_and_update() {
        if dead.changed().await.is_err() {
            return;
        }
    }
}

/// Run `future` on its own task so dropping the caller cannot cut it short
async fn run_to_completion<F>(future: F) -> Result<(), QuakeError>
where
    F: Future<Output = Result<(), QuakeError>> + Send + 'static,
{
    match tokio::spawn(future).await {
        Ok(outcome) => outcome,
        Err(e) => Err(QuakeError::Backend(format!("launch task failed: {e}"))),
    }
}

impl fmt::Debug for QuakeModeApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("QuakeModeApp")
            .field("app_id", &self.inner.app_id)
            .field("state", &shared.state)
            .field("transitioning", &shared.transitioning)
            .finish()
    }
}
