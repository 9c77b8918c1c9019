use std::time::Duration;

/// Maps elapsed time onto linear progress for a single forward run
#[derive(Debug, Clone, Copy)]
pub struct Timeline {
    duration: Duration,
}

impl Timeline {
    /// Create a new timeline with duration
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Get progress (0.0 to 1.0) at given elapsed time
    pub fn get_progress(&self, elapsed: Duration) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }

        let progress = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        progress.clamp(0.0, 1.0) as f32
    }

    pub fn is_complete(&self, elapsed: Duration) -> bool {
        elapsed >= self.duration
    }
}
