use std::time::Duration;

use futures::future::join_all;

use crate::anim_tween::{Tween, TweenEngine};

/// Where a step starts relative to the timeline built so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position {
    /// When everything before it has finished.
    End,
    /// This long before everything before it has finished.
    Overlap(Duration),
    /// At an absolute offset from the timeline start.
    At(Duration),
}

/// A group of tweens that start together.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub start: Duration,
    pub tweens: Vec<Tween>,
}

impl Step {
    pub fn duration(&self) -> Duration {
        self.tweens
            .iter()
            .map(|t| t.duration)
            .max()
            .unwrap_or_default()
    }

    pub fn end(&self) -> Duration {
        self.start + self.duration()
    }
}

/// Ordered, possibly overlapping tween steps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Timeline {
    steps: Vec<Step>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, tweens: impl IntoIterator<Item = Tween>, position: Position) -> Self {
        let end = self.duration();
        let start = match position {
            Position::End => end,
            Position::Overlap(by) => end.saturating_sub(by),
            Position::At(at) => at,
        };
        self.steps.push(Step {
            start,
            tweens: tweens.into_iter().collect(),
        });
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn duration(&self) -> Duration {
        self.steps.iter().map(Step::end).max().unwrap_or_default()
    }

    /// Plays every tween at its scheduled offset and resolves when all have finished.
    pub async fn play(&self, engine: &dyn TweenEngine) {
        let tweens = self.steps.iter().flat_map(|step| {
            step.tweens.iter().map(move |tween| async move {
                if !step.start.is_zero() {
                    tokio::time::sleep(step.start).await;
                }
                engine.animate(tween.clone()).await;
            })
        });
        join_all(tweens).await;
    }
}
