use std::time::Duration;

use tracing::{debug, info};

use crate::{
    anim_ease::Ease,
    anim_timeline::{Position, Timeline},
    anim_tween::{Element, Property, Tween, TweenEngine},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPhase {
    Idle,
    Exiting,
    Done,
}

/// What pushed progress to 100%.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionCause {
    AllSettled,
    Fallback,
}

/// Text block fades and lifts out; the bar collapses while the text is still
/// fading; the overlay fades while the bar is still collapsing.
pub fn exit_timeline() -> Timeline {
    exit_timeline_eased(Ease::POWER2_IN)
}

/// [`exit_timeline`] with every tween on `ease`.
pub fn exit_timeline_eased(ease: Ease) -> Timeline {
    Timeline::new()
        .then(
            [
                Tween::new(Element::ProgressText, Property::Opacity, 1.0, 0.0)
                    .over(Duration::from_millis(600))
                    .eased(ease),
                Tween::new(Element::ProgressText, Property::OffsetY, 0.0, -20.0)
                    .over(Duration::from_millis(600))
                    .eased(ease),
            ],
            Position::End,
        )
        .then(
            [Tween::new(Element::ProgressBar, Property::ScaleX, 1.0, 0.0)
                .over(Duration::from_millis(400))
                .eased(ease)],
            Position::Overlap(Duration::from_millis(400)),
        )
        .then(
            [Tween::new(Element::Overlay, Property::Opacity, 1.0, 0.0)
                .over(Duration::from_millis(500))
                .eased(ease)],
            Position::Overlap(Duration::from_millis(300)),
        )
}

type Callback = Box<dyn FnOnce() + Send>;

/// `Idle -> Exiting -> Done`, with the completion callback run on entering `Done`.
pub struct ExitSequencer {
    phase: ExitPhase,
    cause: Option<CompletionCause>,
    timeline: Timeline,
    on_complete: Option<Callback>,
}

impl std::fmt::Debug for ExitSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitSequencer")
            .field("phase", &self.phase)
            .field("cause", &self.cause)
            .field("pending_callback", &self.on_complete.is_some())
            .finish()
    }
}

impl ExitSequencer {
    pub fn new(on_complete: impl FnOnce() + Send + 'static) -> Self {
        Self {
            phase: ExitPhase::Idle,
            cause: None,
            timeline: exit_timeline(),
            on_complete: Some(Box::new(on_complete)),
        }
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = timeline;
        self
    }

    pub fn phase(&self) -> ExitPhase {
        self.phase
    }

    pub fn cause(&self) -> Option<CompletionCause> {
        self.cause
    }

    pub fn exit_started(&self) -> bool {
        self.phase != ExitPhase::Idle
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Moves to `Exiting`. Only the first call has an effect.
    pub fn begin(&mut self, cause: CompletionCause) -> bool {
        if self.exit_started() {
            debug!(?cause, phase = ?self.phase, "exit already started");
            return false;
        }
        info!(?cause, "starting exit sequence");
        self.phase = ExitPhase::Exiting;
        self.cause = Some(cause);
        true
    }

    /// Moves `Exiting` to `Done` and runs the completion callback.
    ///
    /// Returns false, without calling anything, from any other phase.
    pub fn finish(&mut self) -> bool {
        if self.phase != ExitPhase::Exiting {
            return false;
        }
        self.phase = ExitPhase::Done;
        if let Some(cb) = self.on_complete.take() {
            info!("exit sequence complete");
            cb();
        }
        true
    }

    /// Begins, plays the timeline on `engine`, and finishes.
    ///
    /// Returns false immediately if the exit had already started.
    pub async fn run(&mut self, cause: CompletionCause, engine: &dyn TweenEngine) -> bool {
        if !self.begin(cause) {
            return false;
        }
        self.timeline.play(engine).await;
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim_tween::ClockTweenEngine;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        (calls, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn steps_overlap_in_order() {
        let tl = exit_timeline();
        let steps = tl.steps();
        assert_eq!(steps.len(), 3);
        let (text, bar, overlay) = (&steps[0], &steps[1], &steps[2]);
        assert!(bar.start > text.start && bar.start < text.end());
        assert!(overlay.start > bar.start && overlay.start < bar.end());
        assert_eq!(tl.duration(), Duration::from_millis(800));
    }

    #[test]
    fn eased_timeline_keeps_schedule() {
        let tl = exit_timeline_eased(Ease::InOutCubic);
        let starts: Vec<_> = tl.steps().iter().map(|s| s.start).collect();
        assert_eq!(
            starts,
            exit_timeline().steps().iter().map(|s| s.start).collect::<Vec<_>>()
        );
        assert!(
            tl.steps()
                .iter()
                .flat_map(|s| &s.tweens)
                .all(|t| t.ease == Ease::InOutCubic)
        );
    }

    #[test]
    fn begin_is_one_way() {
        let (calls, cb) = counter();
        let mut exit = ExitSequencer::new(cb);
        assert!(!exit.finish());
        assert!(exit.begin(CompletionCause::AllSettled));
        assert!(!exit.begin(CompletionCause::Fallback));
        assert_eq!(exit.cause(), Some(CompletionCause::AllSettled));
        assert!(exit.finish());
        assert!(!exit.finish());
        assert_eq!(exit.phase(), ExitPhase::Done);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_runs_complete_once() {
        let (calls, cb) = counter();
        let engine = ClockTweenEngine::new(Duration::from_millis(16));
        let mut exit = ExitSequencer::new(cb);

        let start = tokio::time::Instant::now();
        assert!(exit.run(CompletionCause::AllSettled, &engine).await);
        assert!(start.elapsed() >= Duration::from_millis(800));
        assert!(!exit.run(CompletionCause::AllSettled, &engine).await);
        assert!(!exit.run(CompletionCause::Fallback, &engine).await);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let style = engine.style();
        assert!(style.is_hidden());
        assert_eq!(style.bar_scale_x, 0.0);
        assert_eq!(style.text_offset_y, -20.0);
    }
}
