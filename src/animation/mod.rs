use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::host::Surface;

pub mod easing;
pub mod timeline;

// Re-export commonly used types
pub use easing::EasingFunction;
pub use timeline::Timeline;

/// One eased run of a surface's vertical translation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    /// Final translation in pixels
    pub target: f64,
    pub duration: Duration,
    pub easing: EasingFunction,
}

/// Animation engine contract
///
/// `animate` resolves once the surface sits at `tween.target`; the returned
/// future completing is the completion callback. Engines must always finish,
/// even when the surface stops accepting updates halfway.
#[async_trait]
pub trait Animator: Send + Sync {
    async fn animate(&self, surface: Arc<dyn Surface>, tween: Tween);
}

/// Frame-ticking animator that writes interpolated values to the surface
pub struct TweenAnimator {
    frame_interval: Duration,
    frames: AtomicU64,
}

impl Default for TweenAnimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TweenAnimator {
    pub fn new() -> Self {
        Self::with_frame_interval(Duration::from_millis(16)) // 60fps
    }

    pub fn with_frame_interval(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            frames: AtomicU64::new(0),
        }
    }

    /// Total frames written since creation
    pub fn frames_rendered(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Animator for TweenAnimator {
    async fn animate(&self, surface: Arc<dyn Surface>, tween: Tween) {
        let from = surface.translation_y();
        let timeline = Timeline::new(tween.duration);
        let start = Instant::now();

        debug!(
            "🎬 Animating surface {} translation {:.0} -> {:.0} over {:?} ({})",
            surface.id(),
            from,
            tween.target,
            tween.duration,
            tween.easing
        );

        loop {
            let elapsed = start.elapsed();
            let eased = tween.easing.apply(timeline.get_progress(elapsed)) as f64;
            let complete = timeline.is_complete(elapsed);
            let value = if complete {
                tween.target
            } else {
                from + (tween.target - from) * eased
            };

            self.frames.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = surface.set_translation_y(value).await {
                warn!("⚠️  Surface {} rejected animation frame: {}", surface.id(), e);
                break;
            }

            if complete {
                break;
            }

            sleep(self.frame_interval).await;
        }

        debug!("✅ Animation on surface {} completed", surface.id());
    }
}
