//! Quake-style drop-down windows
//!
//! [`QuakeModeApp`] owns one managed window: it launches the application,
//! places the window according to the live settings and slides it in and out.
//! [`QuakeModeManager`] keeps one instance per configured slot.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::animation::Animator;
use crate::config::SettingsStore;
use crate::host::{AppRegistry, WindowClaims, WindowManager};

pub mod app;
pub mod geometry;
pub mod manager;

pub use app::{AppState, QuakeModeApp};
pub use geometry::{HAlign, Placement, VAlign};
pub use manager::QuakeModeManager;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QuakeError {
    #[error("application '{app_id}' not found")]
    Resolution { app_id: String },

    #[error("'{app_id}' did not open a window within {timeout:?}")]
    LaunchTimeout { app_id: String, timeout: Duration },

    #[error("'{app_id}' finished launching without any window")]
    LaunchEmpty { app_id: String },

    #[error("{0}")]
    Backend(String),

    #[error("no application configured for slot {0}")]
    UnknownSlot(u32),
}

/// The collaborators a drop-down instance drives
#[derive(Clone)]
pub struct Host {
    pub registry: Arc<dyn AppRegistry>,
    pub wm: Arc<dyn WindowManager>,
    pub animator: Arc<dyn Animator>,
    pub settings: Arc<dyn SettingsStore>,
    /// Windows adopted by any instance built from this bundle
    pub claims: Arc<WindowClaims>,
}

impl Host {
    /// Bundle the collaborators with a fresh claim set
    pub fn new(
        registry: Arc<dyn AppRegistry>,
        wm: Arc<dyn WindowManager>,
        animator: Arc<dyn Animator>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            registry,
            wm,
            animator,
            settings,
            claims: Arc::new(WindowClaims::new()),
        }
    }
}
