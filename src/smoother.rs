use std::time::Duration;

use tokio::time::Instant;

use crate::{
    anim_ease::{Ease, lerp},
    progress::StatusLabel,
};

/// Eases the displayed counter toward the actual progress.
///
/// Each retarget starts a fresh tween from the value displayed at that instant,
/// so bursts of updates never make the counter jump or run backwards.
#[derive(Clone, Debug)]
pub struct ProgressSmoother {
    duration: Duration,
    ease: Ease,
    from: f64,
    target: u8,
    started: Instant,
}

impl ProgressSmoother {
    pub fn new(duration: Duration, now: Instant) -> Self {
        Self {
            duration,
            ease: Ease::POWER2_OUT,
            from: 0.0,
            target: 0,
            started: now,
        }
    }

    pub fn with_ease(mut self, ease: Ease) -> Self {
        self.ease = ease;
        self
    }

    pub fn target(&self) -> u8 {
        self.target
    }

    /// Points the tween at `target`, starting from the value shown at `now`.
    ///
    /// A target below the current one is ignored.
    pub fn retarget(&mut self, now: Instant, target: u8) {
        let target = target.min(100);
        if target <= self.target {
            return;
        }
        self.from = self.value_at(now);
        self.target = target;
        self.started = now;
    }

    /// Unrounded displayed value; always within `[from, target]`.
    pub fn value_at(&self, now: Instant) -> f64 {
        let t = self
            .ease
            .at(now.saturating_duration_since(self.started), self.duration);
        lerp(self.from, f64::from(self.target), t).clamp(self.from, f64::from(self.target))
    }

    pub fn display_at(&self, now: Instant) -> u8 {
        self.value_at(now).round() as u8
    }

    pub fn label_at(&self, now: Instant) -> StatusLabel {
        StatusLabel::for_progress(self.display_at(now))
    }

    pub fn is_settled(&self, now: Instant) -> bool {
        self.display_at(now) == self.target
    }
}
