use serde::{Deserialize, Serialize};
use std::fmt;

/// Easing curves used by the show/hide transitions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EasingFunction {
    /// Accelerating from rest, used when sliding out
    EaseInQuad,
    /// Decelerating to rest, used when sliding in
    EaseOutQuad,
}

impl EasingFunction {
    /// Apply easing function to progress value (0.0 to 1.0)
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);

        match self {
            EasingFunction::EaseInQuad => t * t,
            EasingFunction::EaseOutQuad => 1.0 - (1.0 - t) * (1.0 - t),
        }
    }
}

impl fmt::Display for EasingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EasingFunction::EaseInQuad => "ease-in-quad",
            EasingFunction::EaseOutQuad => "ease-out-quad",
        };
        f.write_str(name)
    }
}
