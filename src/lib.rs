//! Preloading-screen coordinator.
//!
//! A [`Preloader`] probes a set of media assets in fixed-size batches, turns
//! their settlements into a smoothed 0–100 progress counter with status text,
//! and once everything has settled (or a fallback deadline passes) plays an
//! exit transition and calls the host's completion callback exactly once.
//!
//! Failed and stalled assets never block the page: every outcome counts as
//! settled.
#![forbid(unsafe_code)]

pub mod anim_ease;
pub mod anim_timeline;
pub mod anim_tween;
pub mod assets;
pub mod batch;
pub mod config;
pub mod error;
pub mod exit;
pub mod fallback;
pub mod preloader;
pub mod progress;
pub mod race;
pub mod smoother;

pub use anim_ease::Ease;
pub use anim_timeline::{Position, Timeline};
pub use anim_tween::{ClockTweenEngine, Element, OverlayStyle, Property, Tween, TweenEngine};
pub use assets::{
    AssetDescriptor, AssetOutcome, ReadySignal, describe,
    media::{FsMediaLoader, MediaListeners, MediaLoader},
    probe::AssetProbe,
};
pub use batch::{BatchLoader, Settlement, partition};
pub use config::PreloadConfig;
pub use error::{PreloadError, PreloadResult};
pub use exit::{CompletionCause, ExitPhase, ExitSequencer, exit_timeline, exit_timeline_eased};
pub use fallback::FallbackGuard;
pub use preloader::{AssetReport, PreloadReport, PreloadView, Preloader, ScrollLock};
pub use progress::{ProgressAggregator, StatusLabel};
pub use race::first_settled;
pub use smoother::ProgressSmoother;
