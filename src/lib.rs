//! Quakeland - Quake-style drop-down windows for Hyprland
//!
//! Binds applications to numbered slots; toggling a slot launches the
//! application on first use, then slides its window in from the top (or
//! bottom) edge of the chosen monitor and back out again.

pub mod animation;
pub mod config;
pub mod core;
pub mod host;
pub mod ipc;
pub mod quake;

// Re-export commonly used types
pub use config::{Config, SettingKey, SettingValue, SettingsStore, TomlSettings};
pub use core::daemon::Daemon;
pub use quake::{AppState, Host, QuakeError, QuakeModeApp, QuakeModeManager};

pub use animation::{Animator, EasingFunction, Timeline, Tween, TweenAnimator};
