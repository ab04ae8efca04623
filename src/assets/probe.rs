use std::{sync::Arc, time::Duration};

use futures::FutureExt as _;
use tracing::{info, warn};

use crate::{
    assets::{
        AssetDescriptor, AssetOutcome, ReadySignal,
        media::{MediaListeners, MediaLoader},
    },
    race::first_settled,
};

/// Readies single assets through a [`MediaLoader`], bounded by a timeout.
#[derive(Clone)]
pub struct AssetProbe {
    loader: Arc<dyn MediaLoader>,
    timeout: Duration,
}

impl AssetProbe {
    pub fn new(loader: Arc<dyn MediaLoader>, timeout: Duration) -> Self {
        Self { loader, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Starts loading `asset` and resolves with the first of: a readiness signal,
    /// the error signal, or the timeout. Never fails.
    ///
    /// `total` only feeds the log line.
    pub async fn probe(&self, asset: &AssetDescriptor, total: usize) -> AssetOutcome {
        let MediaListeners {
            can_play_through,
            loaded_data,
            error,
        } = self.loader.load(asset);
        let timeout = self.timeout;

        let outcome = first_settled(vec![
            can_play_through
                .map(|()| AssetOutcome::Loaded {
                    signal: ReadySignal::CanPlayThrough,
                })
                .boxed(),
            loaded_data
                .map(|()| AssetOutcome::Loaded {
                    signal: ReadySignal::LoadedData,
                })
                .boxed(),
            error.map(AssetOutcome::errored).boxed(),
            tokio::time::sleep(timeout)
                .map(|()| AssetOutcome::TimedOut)
                .boxed(),
        ])
        .await;

        let n = asset.ordinal();
        match &outcome {
            AssetOutcome::Loaded { signal } => {
                info!(?signal, "asset {n}/{total} loaded: {}", asset.source);
            }
            AssetOutcome::Errored { info } => {
                warn!("asset {n}/{total} failed to load: {} ({info})", asset.source);
            }
            AssetOutcome::TimedOut => {
                warn!(
                    "asset {n}/{total} timed out after {timeout:?}: {}",
                    asset.source
                );
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{sync::oneshot, time::Instant};

    struct Scripted(fn() -> MediaListeners);

    impl MediaLoader for Scripted {
        fn load(&self, _asset: &AssetDescriptor) -> MediaListeners {
            (self.0)()
        }
    }

    fn probe_with(f: fn() -> MediaListeners) -> AssetProbe {
        AssetProbe::new(Arc::new(Scripted(f)), Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn either_readiness_signal_counts_as_loaded() {
        let asset = AssetDescriptor::new("a.mp4", 0);

        let probe = probe_with(|| MediaListeners {
            loaded_data: async {}.boxed(),
            ..MediaListeners::pending()
        });
        assert_eq!(
            probe.probe(&asset, 1).await,
            AssetOutcome::Loaded {
                signal: ReadySignal::LoadedData
            }
        );

        let probe = probe_with(|| MediaListeners {
            can_play_through: async {}.boxed(),
            ..MediaListeners::pending()
        });
        assert_eq!(
            probe.probe(&asset, 1).await,
            AssetOutcome::Loaded {
                signal: ReadySignal::CanPlayThrough
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn error_signal_settles_as_errored() {
        let probe = probe_with(|| MediaListeners::failed("decode failure"));
        let outcome = probe.probe(&AssetDescriptor::new("bad.mp4", 0), 1).await;
        assert_eq!(outcome, AssetOutcome::errored("decode failure"));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_asset_times_out_at_bound() {
        let probe = probe_with(MediaListeners::pending);
        let start = Instant::now();
        let outcome = probe.probe(&AssetDescriptor::new("hang.mp4", 0), 1).await;
        assert_eq!(outcome, AssetOutcome::TimedOut);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn settlement_detaches_remaining_listeners() {
        let (tx, rx) = oneshot::channel::<()>();
        let (_keep, never) = oneshot::channel::<()>();
        let (_e, err) = oneshot::channel::<String>();
        tx.send(()).unwrap();

        let token = tokio_util::sync::CancellationToken::new();
        let listeners =
            MediaListeners::from_channels(rx, never, err, Some(token.clone().drop_guard()));

        struct Once(std::sync::Mutex<Option<MediaListeners>>);
        impl MediaLoader for Once {
            fn load(&self, _asset: &AssetDescriptor) -> MediaListeners {
                self.0
                    .lock()
                    .unwrap()
                    .take()
                    .unwrap_or_else(MediaListeners::pending)
            }
        }

        let loader = Once(std::sync::Mutex::new(Some(listeners)));
        let probe = AssetProbe::new(Arc::new(loader), Duration::from_secs(10));
        let outcome = probe.probe(&AssetDescriptor::new("a.mp4", 0), 1).await;
        assert!(outcome.is_loaded());
        assert!(token.is_cancelled());
    }
}
