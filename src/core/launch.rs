use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::signal::Subscription;
use crate::host::{AppHandle, Window, WindowClaims, WindowId};
use crate::quake::QuakeError;

/// Bounded wait for a launched application to produce its window
pub const LAUNCH_TIMEOUT: Duration = Duration::from_millis(5000);

/// One request for a new application window, racing a timeout
///
/// The attempt subscribes to `windows-changed` before asking for the window,
/// so a fast application cannot signal before anyone listens. The window it
/// resolves to is claimed in the shared [`WindowClaims`]; windows claimed by
/// other instances are skipped like pre-existing ones. Dropping the
/// attempt (or the future returned by [`LaunchAttempt::outcome`]) cancels it
/// and unsubscribes.
pub struct LaunchAttempt {
    app: Arc<dyn AppHandle>,
    claims: Arc<WindowClaims>,
    known: HashSet<WindowId>,
    changed: Subscription<()>,
    timeout: Duration,
}

impl LaunchAttempt {
    /// Subscribe to the application and send the open-window request
    pub async fn begin(
        app: Arc<dyn AppHandle>,
        claims: Arc<WindowClaims>,
        timeout: Duration,
    ) -> Result<Self, QuakeError> {
        let changed = app.windows_changed().subscribe();
        let known = app.windows().iter().map(|w| w.id()).collect();

        debug!("🚀 Requesting new window from '{}'", app.id());
        app.open_new_window()
            .await
            .map_err(|e| QuakeError::Backend(format!("failed to launch '{}': {}", app.id(), e)))?;

        Ok(Self {
            app,
            claims,
            known,
            changed,
            timeout,
        })
    }

    /// Resolve with the first window the launch produced
    ///
    /// Windows that existed before the request, or that another instance
    /// claimed, are never returned. The returned window is already claimed
    /// and the caller owns that claim. A `windows-changed` that reports no
    /// windows at all fails the attempt; one that only reports pre-existing
    /// or claimed windows keeps waiting.
    pub async fn outcome(self) -> Result<Arc<dyn Window>, QuakeError> {
        let Self {
            app,
            claims,
            known,
            mut changed,
            timeout,
        } = self;
        let app_id = app.id().to_string();

        let wait = async {
            while changed.recv().await.is_some() {
                if app.window_count() == 0 {
                    return Err(QuakeError::LaunchEmpty {
                        app_id: app_id.clone(),
                    });
                }

                let mut fresh = app
                    .windows()
                    .into_iter()
                    .filter(|w| !known.contains(&w.id()) && !claims.is_claimed(w.id()));

                if let Some(window) = fresh.find(|w| claims.claim(w.id())) {
                    let extra = fresh.count();
                    if extra > 0 {
                        warn!(
                            "⚠️  '{}' opened {} more window(s), only {} is managed",
                            app_id,
                            extra,
                            window.id()
                        );
                    }
                    return Ok(window);
                }

                debug!("'{}' windows changed without an unclaimed new window, still waiting", app_id);
            }

            Err(QuakeError::LaunchEmpty {
                app_id: app_id.clone(),
            })
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(QuakeError::LaunchTimeout {
                app_id: app_id.clone(),
                timeout,
            }),
        }
    }
}
