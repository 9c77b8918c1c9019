//! Host collaborator contracts
//!
//! The drop-down core never talks to a compositor directly. It drives the four
//! capabilities below, which a host (Hyprland in [`hyprland`], a scripted host
//! in tests) provides.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::signal::Signal;

pub mod hyprland;

pub use self::hyprland::HyprlandHost;

/// Identity of a managed window as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u64);

/// Identity of a window's renderable surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Integer rectangle in layout coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Application registry: resolves identifiers to launchable applications
pub trait AppRegistry: Send + Sync {
    fn resolve(&self, app_id: &str) -> Option<Arc<dyn AppHandle>>;
}

/// A resolved, launchable application
#[async_trait]
pub trait AppHandle: Send + Sync {
    fn id(&self) -> &str;

    /// Ask the application for a new window; completion is reported later
    /// through [`AppHandle::windows_changed`]
    async fn open_new_window(&self) -> Result<()>;

    fn window_count(&self) -> usize;

    fn windows(&self) -> Vec<Arc<dyn Window>>;

    fn windows_changed(&self) -> &Signal<()>;
}

/// Logical window: frame geometry, focus and minimized state
#[async_trait]
pub trait Window: Send + Sync {
    fn id(&self) -> WindowId;

    /// Renderable representation, absent until the host created it
    fn surface(&self) -> Option<Arc<dyn Surface>>;

    fn has_focus(&self) -> bool;

    fn is_hidden(&self) -> bool;

    fn is_maximized(&self) -> bool;

    fn frame_rect(&self) -> Rect;

    fn work_area_for_monitor(&self, monitor: i32) -> Rect;

    async fn activate(&self) -> Result<()>;

    async fn minimize(&self) -> Result<()>;

    async fn unmaximize(&self) -> Result<()>;

    async fn move_to_monitor(&self, monitor: i32) -> Result<()>;

    async fn move_resize(&self, rect: Rect) -> Result<()>;

    async fn stick(&self) -> Result<()>;

    async fn set_above(&self, above: bool) -> Result<()>;

    fn size_changed(&self) -> &Signal<()>;

    fn unmanaged(&self) -> &Signal<()>;
}

/// Visual surface: position, clip and translation of a window's pixels
#[async_trait]
pub trait Surface: Send + Sync {
    fn id(&self) -> SurfaceId;

    fn width(&self) -> i32;

    fn height(&self) -> i32;

    fn is_mapped(&self) -> bool;

    fn translation_y(&self) -> f64;

    async fn set_translation_y(&self, value: f64) -> Result<()>;

    /// `None` removes the clip
    async fn set_clip(&self, clip: Option<Rect>) -> Result<()>;

    /// Stack above every sibling under the same parent
    async fn raise_to_top(&self) -> Result<()>;
}

/// Predicate deciding whether a window is left out of overview/alt-tab lists
pub type ExclusionPredicate = Arc<dyn Fn(WindowId) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExclusionId(u64);

/// Window manager: display-wide signals and effect control
#[async_trait]
pub trait WindowManager: Send + Sync {
    fn monitor_count(&self) -> i32;

    /// Emitted once per surface when it first becomes renderable
    fn mapped(&self) -> &Signal<SurfaceId>;

    /// Emitted with the newly focused window whenever focus moves
    fn focus_changed(&self) -> &Signal<Option<WindowId>>;

    async fn skip_next_effect(&self, surface: SurfaceId);

    async fn kill_effects(&self, surface: SurfaceId);

    fn register_exclusion(&self, predicate: ExclusionPredicate) -> ExclusionId;

    fn unregister_exclusion(&self, id: ExclusionId);

    fn is_excluded(&self, window: WindowId) -> bool;
}

/// Bookkeeping for visibility exclusion predicates, shared by hosts
#[derive(Default)]
pub struct ExclusionRegistry {
    next_id: AtomicU64,
    predicates: RwLock<HashMap<ExclusionId, ExclusionPredicate>>,
}

impl ExclusionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, predicate: ExclusionPredicate) -> ExclusionId {
        let id = ExclusionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.predicates.write().insert(id, predicate);
        id
    }

    pub fn unregister(&self, id: ExclusionId) {
        self.predicates.write().remove(&id);
    }

    pub fn is_excluded(&self, window: WindowId) -> bool {
        self.predicates.read().values().any(|predicate| predicate(window))
    }

    pub fn len(&self) -> usize {
        self.predicates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Windows currently owned by a drop-down, shared by every instance
///
/// A launch only resolves to a window it managed to claim here, so two
/// instances of the same application never end up driving one window.
#[derive(Debug, Default)]
pub struct WindowClaims {
    claimed: Mutex<HashSet<WindowId>>,
}

impl WindowClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `window`, returning false when another instance already owns it
    pub fn claim(&self, window: WindowId) -> bool {
        self.claimed.lock().insert(window)
    }

    pub fn release(&self, window: WindowId) {
        self.claimed.lock().remove(&window);
    }

    pub fn is_claimed(&self, window: WindowId) -> bool {
        self.claimed.lock().contains(&window)
    }

    pub fn len(&self) -> usize {
        self.claimed.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
