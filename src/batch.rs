use std::{collections::VecDeque, time::Duration};

use futures::{
    FutureExt as _, Stream, StreamExt as _,
    future::BoxFuture,
    stream::{self, FuturesUnordered},
};
use tracing::debug;

use crate::assets::{AssetDescriptor, AssetOutcome, probe::AssetProbe};

/// One asset's outcome, tagged with the batch it ran in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub asset: AssetDescriptor,
    pub outcome: AssetOutcome,
    pub batch: usize,
}

/// Sizes of the batches `n` assets are split into.
pub fn partition(n: usize, batch_size: usize) -> Vec<usize> {
    if batch_size == 0 {
        return Vec::new();
    }
    (0..n.div_ceil(batch_size))
        .map(|i| batch_size.min(n - i * batch_size))
        .collect()
}

/// Runs probes in fixed-size batches, one batch at a time.
#[derive(Clone)]
pub struct BatchLoader {
    probe: AssetProbe,
    batch_size: usize,
    pause: Duration,
}

struct BatchState {
    probe: AssetProbe,
    queue: VecDeque<AssetDescriptor>,
    batch_size: usize,
    pause: Duration,
    total: usize,
    next_batch: usize,
    in_flight: FuturesUnordered<BoxFuture<'static, Settlement>>,
}

impl BatchLoader {
    pub fn new(probe: AssetProbe, batch_size: usize, pause: Duration) -> Self {
        Self {
            probe,
            batch_size: batch_size.max(1),
            pause,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Lazily probes `assets`, yielding settlements as they happen.
    ///
    /// Settlements within a batch arrive in completion order. A batch is only
    /// started once the consumer has pulled every settlement of the previous
    /// one and the inter-batch pause has elapsed. Dropping the stream drops
    /// every in-flight probe.
    pub fn settlements(
        &self,
        assets: Vec<AssetDescriptor>,
    ) -> impl Stream<Item = Settlement> + Send + 'static {
        let state = BatchState {
            probe: self.probe.clone(),
            total: assets.len(),
            queue: assets.into(),
            batch_size: self.batch_size,
            pause: self.pause,
            next_batch: 0,
            in_flight: FuturesUnordered::new(),
        };

        stream::unfold(state, |mut st| async move {
            loop {
                if let Some(settlement) = st.in_flight.next().await {
                    return Some((settlement, st));
                }
                if st.queue.is_empty() {
                    debug!(batches = st.next_batch, "all batches settled");
                    return None;
                }
                if st.next_batch > 0 {
                    tokio::time::sleep(st.pause).await;
                }
                st.start_next_batch();
            }
        })
    }

    /// Probes every asset and collects the settlements in arrival order.
    pub async fn load_all(&self, assets: Vec<AssetDescriptor>) -> Vec<Settlement> {
        self.settlements(assets).collect().await
    }
}

impl BatchState {
    fn start_next_batch(&mut self) {
        let batch = self.next_batch;
        let take = self.batch_size.min(self.queue.len());
        debug!(batch, size = take, "starting batch");
        for asset in self.queue.drain(..take) {
            let probe = self.probe.clone();
            let total = self.total;
            self.in_flight.push(
                async move {
                    let outcome = probe.probe(&asset, total).await;
                    Settlement {
                        asset,
                        outcome,
                        batch,
                    }
                }
                .boxed(),
            );
        }
        self.next_batch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_splits_into_fixed_groups() {
        assert_eq!(partition(4, 3), vec![3, 1]);
        assert_eq!(partition(3, 3), vec![3]);
        assert_eq!(partition(7, 3), vec![3, 3, 1]);
        assert_eq!(partition(1, 3), vec![1]);
        assert!(partition(0, 3).is_empty());
        assert!(partition(5, 0).is_empty());
    }
}
