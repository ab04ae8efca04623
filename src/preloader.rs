//! The preloading session: probes assets in batches, smooths the counter and
//! runs the exit sequence exactly once.

use std::{pin::Pin, sync::Arc, time::Duration};

use futures::{FutureExt as _, StreamExt as _, future::BoxFuture};
use tokio::{
    sync::watch,
    time::{Instant, MissedTickBehavior, Sleep},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    anim_timeline::Timeline,
    anim_tween::{ClockTweenEngine, OverlayStyle, TweenEngine},
    assets::{
        AssetDescriptor, AssetOutcome, describe,
        media::MediaLoader,
        probe::AssetProbe,
    },
    batch::{BatchLoader, Settlement},
    config::PreloadConfig,
    error::PreloadResult,
    anim_ease::Ease,
    exit::{CompletionCause, ExitPhase, ExitSequencer, exit_timeline_eased},
    fallback::FallbackGuard,
    progress::{ProgressAggregator, StatusLabel},
    smoother::ProgressSmoother,
};

/// What the host renders on each frame.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PreloadView {
    pub display_progress: u8,
    pub actual_progress: u8,
    pub status: StatusLabel,
    pub status_text: String,
    pub settled: usize,
    pub total: usize,
    /// Assets implied by the actual progress, for the "N/M" counter.
    pub asset_counter: usize,
    pub phase: ExitPhase,
    pub style: OverlayStyle,
}

impl PreloadView {
    fn initial(total: usize) -> Self {
        Self {
            display_progress: 0,
            actual_progress: 0,
            status: StatusLabel::Initializing,
            status_text: StatusLabel::Initializing.text("").to_string(),
            settled: 0,
            total,
            asset_counter: 0,
            phase: ExitPhase::Idle,
            style: OverlayStyle::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct AssetReport {
    pub source: String,
    pub index: usize,
    /// `None` when the session ended before the asset settled.
    pub outcome: Option<AssetOutcome>,
}

/// Summary of one session.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PreloadReport {
    pub total: usize,
    pub settled: usize,
    pub assets: Vec<AssetReport>,
    /// Distinct actual-progress values in the order they were reached, from 0.
    pub progress_history: Vec<u8>,
    pub completed: bool,
    pub cause: Option<CompletionCause>,
    pub elapsed_ms: u64,
}

/// Host-side scroll switch, locked for as long as the preloader is active.
pub trait ScrollLock: Send + Sync {
    fn set_locked(&self, locked: bool);
}

/// Unlocks on drop, so the page never stays frozen after the session ends.
struct ScrollLockGuard(Arc<dyn ScrollLock>);

impl ScrollLockGuard {
    fn lock(lock: Arc<dyn ScrollLock>) -> Self {
        lock.set_locked(true);
        Self(lock)
    }
}

impl Drop for ScrollLockGuard {
    fn drop(&mut self) {
        self.0.set_locked(false);
    }
}

/// One preloader session, configured and ready to run.
pub struct Preloader {
    config: PreloadConfig,
    loader: Arc<dyn MediaLoader>,
    engine: Arc<dyn TweenEngine>,
    style: Option<watch::Receiver<OverlayStyle>>,
    exit_timeline: Timeline,
    view: watch::Sender<PreloadView>,
}

impl Preloader {
    /// Validates `config` and sets up a session using the built-in clock tween engine.
    pub fn new(config: PreloadConfig, loader: Arc<dyn MediaLoader>) -> PreloadResult<Self> {
        config.validate()?;
        let engine = ClockTweenEngine::new(config.frame());
        let style = Some(engine.subscribe());
        let total = config.effective_resources().len();
        let exit_timeline = exit_timeline_eased(config.exit_ease);
        Ok(Self {
            config,
            loader,
            engine: Arc::new(engine),
            style,
            exit_timeline,
            view: watch::Sender::new(PreloadView::initial(total)),
        })
    }

    /// Replaces the tween engine. The published overlay style then stays at
    /// its defaults; the engine owns the visuals.
    pub fn with_engine(mut self, engine: Arc<dyn TweenEngine>) -> Self {
        self.engine = engine;
        self.style = None;
        self
    }

    /// Replaces the exit transition played once progress completes.
    pub fn with_exit_timeline(mut self, timeline: Timeline) -> Self {
        self.exit_timeline = timeline;
        self
    }

    pub fn config(&self) -> &PreloadConfig {
        &self.config
    }

    pub fn subscribe(&self) -> watch::Receiver<PreloadView> {
        self.view.subscribe()
    }

    /// Runs the session with `lock` held until completion or teardown.
    pub async fn run_locked(
        self,
        lock: Arc<dyn ScrollLock>,
        on_complete: impl FnOnce() + Send + 'static,
        cancel: CancellationToken,
    ) -> PreloadReport {
        let guard = ScrollLockGuard::lock(lock);
        self.run(
            move || {
                drop(guard);
                on_complete();
            },
            cancel,
        )
        .await
    }

    /// Runs the session to completion, or until `cancel` fires.
    ///
    /// `on_complete` is called exactly once when the exit sequence finishes and
    /// never after teardown. Dropping the returned future tears the session
    /// down the same way.
    #[tracing::instrument(name = "preload", skip_all)]
    pub async fn run(
        self,
        on_complete: impl FnOnce() + Send + 'static,
        cancel: CancellationToken,
    ) -> PreloadReport {
        let cfg = self.config.clone();
        let started = Instant::now();
        let assets = describe(&cfg.effective_resources());
        let total = assets.len();
        info!("starting to load {total} assets");

        let probe = AssetProbe::new(Arc::clone(&self.loader), cfg.probe_timeout());
        let settlements = BatchLoader::new(probe, cfg.batch_size, cfg.batch_pause())
            .settlements(assets.clone());
        tokio::pin!(settlements);
        let mut loading = true;

        let exit = ExitSequencer::new(on_complete).with_timeline(self.exit_timeline.clone());
        let mut session = LoadSession::new(total, cfg.smoothing(), cfg.smoothing_ease, started, exit);
        let mut fallback = FallbackGuard::arm(cfg.fallback_timeout());
        let bootstrap = tokio::time::sleep(cfg.bootstrap_delay());
        tokio::pin!(bootstrap);
        let mut bootstrap_pending = true;
        let mut grace: Option<Grace> = None;
        let mut playing: Option<BoxFuture<'static, ()>> = None;
        let mut frames = tokio::time::interval(cfg.frame());
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let completed = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("preloader torn down before completion");
                    break false;
                }

                next = settlements.next(), if loading => match next {
                    Some(settlement) => {
                        let all_settled = session.settle(settlement, Instant::now());
                        if all_settled && !session.exit_started() && grace.is_none() {
                            grace = Some(Grace::new(cfg.grace(), CompletionCause::AllSettled));
                        }
                    }
                    None => {
                        loading = false;
                        info!("all assets processed");
                    }
                },

                _ = &mut bootstrap, if bootstrap_pending => {
                    bootstrap_pending = false;
                    session.apply_bootstrap_floor(cfg.bootstrap_floor, Instant::now());
                }

                _ = fallback.fired() => {
                    if session.exit_started() {
                        debug!("fallback deadline passed during exit, ignoring");
                    } else if session.progress.all_settled() {
                        debug!(
                            "fallback deadline passed with every asset settled, exit already scheduled"
                        );
                    } else {
                        warn!(
                            "loading fallback triggered after {:?}",
                            cfg.fallback_timeout()
                        );
                        session.force_complete(Instant::now());
                        if grace.is_none() {
                            grace = Some(Grace::new(cfg.fallback_grace(), CompletionCause::Fallback));
                        }
                    }
                }

                cause = Grace::elapsed(&mut grace) => {
                    grace = None;
                    if session.exit.begin(cause) {
                        let timeline = session.exit.timeline().clone();
                        let engine = Arc::clone(&self.engine);
                        playing = Some(async move { timeline.play(engine.as_ref()).await }.boxed());
                    }
                }

                _ = until_done(&mut playing) => {
                    playing = None;
                    fallback.disarm();
                    session.exit.finish();
                    break true;
                }

                _ = frames.tick() => {
                    self.publish(&session);
                }
            }
        };

        self.publish(&session);
        session.into_report(assets, completed, started.elapsed())
    }

    fn publish(&self, session: &LoadSession) {
        let now = Instant::now();
        let progress = &session.progress;
        let display_progress = session.display_progress(now);
        let actual_progress = progress.current_percentage();
        let status = StatusLabel::for_progress(display_progress);
        let style = self
            .style
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or_default();
        let view = PreloadView {
            display_progress,
            actual_progress,
            status,
            status_text: status.text(&self.config.completion_message).to_string(),
            settled: progress.settled(),
            total: progress.total(),
            asset_counter: progress.counter_for(actual_progress),
            phase: session.phase(),
            style,
        };
        self.view.send_if_modified(|current| {
            if *current == view {
                return false;
            }
            *current = view;
            true
        });
    }
}

/// Mutable state of one run, owned by [`Preloader::run`] and dropped with it.
struct LoadSession {
    progress: ProgressAggregator,
    smoother: ProgressSmoother,
    exit: ExitSequencer,
    outcomes: Vec<Option<AssetOutcome>>,
    history: Vec<u8>,
}

impl LoadSession {
    fn new(
        total: usize,
        smoothing: Duration,
        ease: Ease,
        now: Instant,
        exit: ExitSequencer,
    ) -> Self {
        Self {
            progress: ProgressAggregator::new(total),
            smoother: ProgressSmoother::new(smoothing, now).with_ease(ease),
            exit,
            outcomes: vec![None; total],
            history: vec![0],
        }
    }

    fn display_progress(&self, now: Instant) -> u8 {
        self.smoother.display_at(now)
    }

    fn exit_started(&self) -> bool {
        self.exit.exit_started()
    }

    fn phase(&self) -> ExitPhase {
        self.exit.phase()
    }

    /// Accounts for one settlement; returns whether every asset has now settled.
    fn settle(&mut self, settlement: Settlement, now: Instant) -> bool {
        let actual = self.progress.record_settlement();
        self.progress_changed(actual, now);
        debug!(
            settled = self.progress.settled(),
            actual,
            outcome = settlement.outcome.label(),
            "asset settled"
        );
        if let Some(slot) = self.outcomes.get_mut(settlement.asset.index) {
            *slot = Some(settlement.outcome);
        }
        self.progress.all_settled()
    }

    fn apply_bootstrap_floor(&mut self, floor: u8, now: Instant) {
        if self.progress.apply_bootstrap_floor(floor) {
            let actual = self.progress.current_percentage();
            self.progress_changed(actual, now);
            debug!(actual, "nothing settled yet, showing bootstrap floor");
        }
    }

    fn force_complete(&mut self, now: Instant) {
        self.progress.force_complete();
        self.progress_changed(100, now);
    }

    fn progress_changed(&mut self, actual: u8, now: Instant) {
        if self.history.last() != Some(&actual) {
            self.history.push(actual);
        }
        self.smoother.retarget(now, actual);
    }

    fn into_report(
        self,
        assets: Vec<AssetDescriptor>,
        completed: bool,
        elapsed: Duration,
    ) -> PreloadReport {
        let total = self.progress.total();
        let settled = self.progress.settled();
        let cause = self.exit.cause();
        let assets = assets
            .into_iter()
            .zip(self.outcomes)
            .map(|(AssetDescriptor { source, index }, outcome)| AssetReport {
                source,
                index,
                outcome,
            })
            .collect();

        PreloadReport {
            total,
            settled,
            assets,
            progress_history: self.history,
            completed,
            cause,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Pending grace delay before the exit sequence starts.
struct Grace {
    timer: Pin<Box<Sleep>>,
    cause: CompletionCause,
}

impl Grace {
    fn new(delay: Duration, cause: CompletionCause) -> Self {
        debug!(?cause, ?delay, "progress complete, exit scheduled");
        Self {
            timer: Box::pin(tokio::time::sleep(delay)),
            cause,
        }
    }

    async fn elapsed(slot: &mut Option<Self>) -> CompletionCause {
        match slot {
            Some(grace) => {
                grace.timer.as_mut().await;
                grace.cause
            }
            None => std::future::pending().await,
        }
    }
}

async fn until_done(playing: &mut Option<BoxFuture<'static, ()>>) {
    match playing {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}
