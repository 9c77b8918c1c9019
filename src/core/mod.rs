pub mod daemon;
pub mod hot_reload;
pub mod launch;
pub mod notifier;
pub mod signal;

pub use daemon::Daemon;
pub use hot_reload::{HotReloadConfig, HotReloadManager, ReloadEvent};
pub use launch::{LaunchAttempt, LAUNCH_TIMEOUT};
pub use notifier::{DesktopNotifier, LogNotifier, Notifier};
pub use signal::{Signal, Subscription};
