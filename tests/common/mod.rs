//! Scripted host used by the integration tests
//!
//! Every collaborator records what the drop-down asked of it, and the
//! application's launch behaviour is chosen per test.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use quakeland::animation::{Animator, Tween};
use quakeland::config::{Config, TomlSettings};
use quakeland::core::notifier::Notifier;
use quakeland::core::signal::Signal;
use quakeland::host::{
    AppHandle, AppRegistry, ExclusionId, ExclusionPredicate, ExclusionRegistry, Rect, Surface,
    SurfaceId, Window, WindowId, WindowManager,
};
use quakeland::quake::Host;

pub const TERMINAL: &str = "terminal";
pub const MONITOR_0: Rect = Rect::new(0, 0, 1920, 1040);
pub const MONITOR_1: Rect = Rect::new(1920, 0, 2560, 1400);

/// What the application does when asked for a new window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LaunchBehavior {
    /// Open a window after the delay, mapped right away
    Open(Duration),
    /// Open a window after the delay, mapped only when the test says so
    OpenUnmapped(Duration),
    /// Open several mapped windows at once after the delay
    OpenMany(Duration, usize),
    /// Report a windows change with zero windows
    Empty(Duration),
    /// Never produce anything
    Hang,
    /// Reject the request outright
    Fail,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Activate,
    Minimize,
    Unmaximize,
    MoveToMonitor(i32),
    MoveResize(Rect),
    Stick,
    SetAbove(bool),
    SetClip(Option<Rect>),
    RaiseToTop,
}

pub struct MockWindow {
    me: Weak<MockWindow>,
    id: WindowId,
    wm: Arc<MockWm>,
    hidden: AtomicBool,
    maximized: AtomicBool,
    mapped: AtomicBool,
    /// When false, move_resize requests are recorded but never applied
    reports_resize: AtomicBool,
    frame: Mutex<Rect>,
    translation: Mutex<f64>,
    calls: Mutex<Vec<Call>>,
    size_changed: Signal<()>,
    unmanaged: Signal<()>,
}

impl MockWindow {
    pub fn new(id: WindowId, wm: Arc<MockWm>, mapped: bool) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            id,
            wm,
            hidden: AtomicBool::new(false),
            maximized: AtomicBool::new(false),
            mapped: AtomicBool::new(mapped),
            reports_resize: AtomicBool::new(true),
            frame: Mutex::new(Rect::new(100, 100, 640, 480)),
            translation: Mutex::new(0.0),
            calls: Mutex::new(Vec::new()),
            size_changed: Signal::new(),
            unmanaged: Signal::new(),
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.id
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn last_move_resize(&self) -> Option<Rect> {
        self.calls.lock().iter().rev().find_map(|c| match c {
            Call::MoveResize(rect) => Some(*rect),
            _ => None,
        })
    }

    pub fn translation(&self) -> f64 {
        *self.translation.lock()
    }

    pub fn set_maximized(&self, maximized: bool) {
        self.maximized.store(maximized, Ordering::SeqCst);
    }

    /// Minimize from outside the drop-down, as a user would
    pub fn minimize_externally(&self) {
        self.hidden.store(true, Ordering::SeqCst);
    }

    /// Map the surface and announce it
    pub fn map(&self) {
        self.mapped.store(true, Ordering::SeqCst);
        self.wm.mapped.emit(SurfaceId(self.id.0));
    }

    /// Close the window as the compositor would
    pub fn close(&self) {
        self.unmanaged.emit(());
    }

    pub fn size_changed_subscribers(&self) -> usize {
        self.size_changed.subscriber_count()
    }

    pub fn unmanaged_subscribers(&self) -> usize {
        self.unmanaged.subscriber_count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Window for MockWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn surface(&self) -> Option<Arc<dyn Surface>> {
        self.me.upgrade().map(|w| w as Arc<dyn Surface>)
    }

    fn has_focus(&self) -> bool {
        self.wm.focused() == Some(self.id)
    }

    fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::SeqCst)
    }

    fn is_maximized(&self) -> bool {
        self.maximized.load(Ordering::SeqCst)
    }

    fn frame_rect(&self) -> Rect {
        *self.frame.lock()
    }

    fn work_area_for_monitor(&self, monitor: i32) -> Rect {
        self.wm.work_area(monitor)
    }

    async fn activate(&self) -> Result<()> {
        self.record(Call::Activate);
        self.hidden.store(false, Ordering::SeqCst);
        self.wm.focus(Some(self.id));
        Ok(())
    }

    async fn minimize(&self) -> Result<()> {
        self.record(Call::Minimize);
        self.hidden.store(true, Ordering::SeqCst);
        if self.has_focus() {
            self.wm.focus(None);
        }
        Ok(())
    }

    async fn unmaximize(&self) -> Result<()> {
        self.record(Call::Unmaximize);
        self.maximized.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn move_to_monitor(&self, monitor: i32) -> Result<()> {
        self.record(Call::MoveToMonitor(monitor));
        Ok(())
    }

    async fn move_resize(&self, rect: Rect) -> Result<()> {
        self.record(Call::MoveResize(rect));
        if !self.reports_resize.load(Ordering::SeqCst) {
            // The compositor never confirms the new frame
            return Ok(());
        }
        let resized = {
            let mut frame = self.frame.lock();
            let resized = frame.width != rect.width || frame.height != rect.height;
            *frame = rect;
            resized
        };
        if resized {
            self.size_changed.emit(());
        }
        Ok(())
    }

    async fn stick(&self) -> Result<()> {
        self.record(Call::Stick);
        Ok(())
    }

    async fn set_above(&self, above: bool) -> Result<()> {
        self.record(Call::SetAbove(above));
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
impl Surface for MockWindow {
    fn id(&self) -> SurfaceId {
        SurfaceId(self.id.0)
    }

    fn width(&self) -> i32 {
        self.frame.lock().width
    }

    fn height(&self) -> i32 {
        self.frame.lock().height
    }

    fn is_mapped(&self) -> bool {
        self.mapped.load(Ordering::SeqCst)
    }

    fn translation_y(&self) -> f64 {
        *self.translation.lock()
    }

    async fn set_translation_y(&self, value: f64) -> Result<()> {
        *self.translation.lock() = value;
        Ok(())
    }

    async fn set_clip(&self, clip: Option<Rect>) -> Result<()> {
        self.record(Call::SetClip(clip));
        Ok(())
    }

    async fn raise_to_top(&self) -> Result<()> {
        self.record(Call::RaiseToTop);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockWm {
    monitors: Mutex<Vec<Rect>>,
    active: Mutex<Option<WindowId>>,
    mapped: Signal<SurfaceId>,
    focus_changed: Signal<Option<WindowId>>,
    exclusions: ExclusionRegistry,
    skipped: AtomicUsize,
    killed: AtomicUsize,
}

impl MockWm {
    pub fn new(monitors: Vec<Rect>) -> Arc<Self> {
        let wm = Self::default();
        *wm.monitors.lock() = monitors;
        Arc::new(wm)
    }

    pub fn set_monitors(&self, monitors: Vec<Rect>) {
        *self.monitors.lock() = monitors;
    }

    pub fn work_area(&self, monitor: i32) -> Rect {
        let monitors = self.monitors.lock();
        usize::try_from(monitor)
            .ok()
            .and_then(|i| monitors.get(i))
            .copied()
            .unwrap_or(MONITOR_0)
    }

    pub fn focused(&self) -> Option<WindowId> {
        *self.active.lock()
    }

    /// Move focus and announce it
    pub fn focus(&self, window: Option<WindowId>) {
        *self.active.lock() = window;
        self.focus_changed.emit(window);
    }

    pub fn exclusion_count(&self) -> usize {
        self.exclusions.len()
    }

    pub fn skipped_effects(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    pub fn killed_effects(&self) -> usize {
        self.killed.load(Ordering::SeqCst)
    }

    pub fn focus_subscribers(&self) -> usize {
        self.focus_changed.subscriber_count()
    }

    pub fn mapped_subscribers(&self) -> usize {
        self.mapped.subscriber_count()
    }
}

#[async_trait]
impl WindowManager for MockWm {
    fn monitor_count(&self) -> i32 {
        self.monitors.lock().len() as i32
    }

    fn mapped(&self) -> &Signal<SurfaceId> {
        &self.mapped
    }

    fn focus_changed(&self) -> &Signal<Option<WindowId>> {
        &self.focus_changed
    }

    async fn skip_next_effect(&self, _surface: SurfaceId) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    async fn kill_effects(&self, _surface: SurfaceId) {
        self.killed.fetch_add(1, Ordering::SeqCst);
    }

    fn register_exclusion(&self, predicate: ExclusionPredicate) -> ExclusionId {
        self.exclusions.register(predicate)
    }

    fn unregister_exclusion(&self, id: ExclusionId) {
        self.exclusions.unregister(id);
    }

    fn is_excluded(&self, window: WindowId) -> bool {
        self.exclusions.is_excluded(window)
    }
}

pub struct MockApp {
    me: Weak<MockApp>,
    id: String,
    wm: Arc<MockWm>,
    behavior: Mutex<LaunchBehavior>,
    next_id: Arc<AtomicU64>,
    windows: Mutex<Vec<Arc<MockWindow>>>,
    windows_changed: Signal<()>,
    open_requests: AtomicUsize,
    silent_resize: AtomicBool,
    initial_frame: Mutex<Option<Rect>>,
}

impl MockApp {
    fn new(id: &str, wm: Arc<MockWm>, behavior: LaunchBehavior, next_id: Arc<AtomicU64>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            id: id.to_string(),
            wm,
            behavior: Mutex::new(behavior),
            next_id,
            windows: Mutex::new(Vec::new()),
            windows_changed: Signal::new(),
            open_requests: AtomicUsize::new(0),
            silent_resize: AtomicBool::new(false),
            initial_frame: Mutex::new(None),
        })
    }

    pub fn set_behavior(&self, behavior: LaunchBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// New windows never apply or report a resize
    pub fn set_silent_resize(&self, silent: bool) {
        self.silent_resize.store(silent, Ordering::SeqCst);
    }

    /// Frame new windows start with instead of the default
    pub fn set_initial_frame(&self, frame: Rect) {
        *self.initial_frame.lock() = Some(frame);
    }

    /// Every window in opening order
    pub fn all_windows(&self) -> Vec<Arc<MockWindow>> {
        self.windows.lock().clone()
    }

    pub fn open_requests(&self) -> usize {
        self.open_requests.load(Ordering::SeqCst)
    }

    pub fn windows_changed_subscribers(&self) -> usize {
        self.windows_changed.subscriber_count()
    }

    /// Most recently opened window
    pub fn last_window(&self) -> Option<Arc<MockWindow>> {
        self.windows.lock().last().cloned()
    }

    /// Add a window without any launch request, as a pre-existing instance
    pub fn add_window(&self, mapped: bool) -> Arc<MockWindow> {
        let window = self.create_window(mapped);
        self.windows_changed.emit(());
        window
    }

    fn create_window(&self, mapped: bool) -> Arc<MockWindow> {
        let id = WindowId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let window = MockWindow::new(id, self.wm.clone(), mapped);
        window
            .reports_resize
            .store(!self.silent_resize.load(Ordering::SeqCst), Ordering::SeqCst);
        if let Some(frame) = *self.initial_frame.lock() {
            *window.frame.lock() = frame;
        }
        self.windows.lock().push(window.clone());
        window
    }

    /// Drop every window and announce the change
    pub fn clear_windows(&self) {
        self.windows.lock().clear();
        self.windows_changed.emit(());
    }
}

#[async_trait]
impl AppHandle for MockApp {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open_new_window(&self) -> Result<()> {
        self.open_requests.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock();
        let Some(app) = self.me.upgrade() else {
            return Ok(());
        };

        match behavior {
            LaunchBehavior::Open(delay) | LaunchBehavior::OpenUnmapped(delay) => {
                let mapped = matches!(behavior, LaunchBehavior::Open(_));
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    app.add_window(mapped);
                });
            }
            LaunchBehavior::OpenMany(delay, count) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    for _ in 0..count {
                        app.create_window(true);
                    }
                    app.windows_changed.emit(());
                });
            }
            LaunchBehavior::Empty(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    app.clear_windows();
                });
            }
            LaunchBehavior::Hang => {}
            LaunchBehavior::Fail => anyhow::bail!("spawn failed"),
        }
        Ok(())
    }

    fn window_count(&self) -> usize {
        self.windows.lock().len()
    }

    fn windows(&self) -> Vec<Arc<dyn Window>> {
        self.windows
            .lock()
            .iter()
            .map(|w| w.clone() as Arc<dyn Window>)
            .collect()
    }

    fn windows_changed(&self) -> &Signal<()> {
        &self.windows_changed
    }
}

#[derive(Default)]
pub struct MockRegistry {
    apps: Mutex<HashMap<String, Arc<MockApp>>>,
}

impl AppRegistry for MockRegistry {
    fn resolve(&self, app_id: &str) -> Option<Arc<dyn AppHandle>> {
        self.apps
            .lock()
            .get(app_id)
            .map(|app| app.clone() as Arc<dyn AppHandle>)
    }
}

/// Records every tween and takes the tween's duration to land on its target
#[derive(Default)]
pub struct RecordingAnimator {
    tweens: Mutex<Vec<Tween>>,
}

impl RecordingAnimator {
    pub fn tweens(&self) -> Vec<Tween> {
        self.tweens.lock().clone()
    }
}

#[async_trait]
impl Animator for RecordingAnimator {
    async fn animate(&self, surface: Arc<dyn Surface>, tween: Tween) {
        self.tweens.lock().push(tween);
        tokio::time::sleep(tween.duration).await;
        let _ = surface.set_translation_y(tween.target).await;
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

pub struct Harness {
    pub wm: Arc<MockWm>,
    pub registry: Arc<MockRegistry>,
    pub animator: Arc<RecordingAnimator>,
    pub settings: Arc<TomlSettings>,
    pub host: Host,
    next_id: Arc<AtomicU64>,
}

impl Harness {
    /// Default settings, one monitor, `terminal` in slot 1 opening after 50ms
    pub fn new() -> Self {
        let mut config = Config::default();
        config.apps.insert("1".to_string(), TERMINAL.to_string());
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Self {
        let wm = MockWm::new(vec![MONITOR_0]);
        let registry = Arc::new(MockRegistry::default());
        let animator = Arc::new(RecordingAnimator::default());
        let settings = Arc::new(TomlSettings::new(&config));

        let host = Host::new(
            registry.clone(),
            wm.clone(),
            animator.clone(),
            settings.clone(),
        );

        let harness = Self {
            wm,
            registry,
            animator,
            settings,
            host,
            next_id: Arc::new(AtomicU64::new(0x1000)),
        };
        harness.add_app(TERMINAL, LaunchBehavior::Open(Duration::from_millis(50)));
        harness
    }

    pub fn add_app(&self, id: &str, behavior: LaunchBehavior) -> Arc<MockApp> {
        let app = MockApp::new(id, self.wm.clone(), behavior, self.next_id.clone());
        self.registry.apps.lock().insert(id.to_string(), app.clone());
        app
    }

    pub fn app(&self, id: &str) -> Arc<MockApp> {
        self.registry.apps.lock()[id].clone()
    }

    pub fn terminal(&self) -> Arc<MockApp> {
        self.app(TERMINAL)
    }
}

/// Let spawned listener tasks run
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
