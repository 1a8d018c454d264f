//! Fixed-cadence collection loop: samples a [`MetricSource`] on a ticker,
//! publishes the latest (optionally filtered) frame for the signal
//! calculator, and assembles `b` consecutive frames into a `d x b` batch
//! matrix for the FPCA agent.

use std::sync::Arc;
use std::time::Duration;

use nalgebra::DMatrix;
use shared::constants::{METRIC_BATCH_SIZE, METRIC_COLLECT_PERIOD_MS};
use shared::utils::AtomicShared;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::filter::{Filter, NullFilter};
use crate::source::MetricSource;

/// Collects frames at a fixed cadence, smoothing them through a [`Filter`],
/// and hands off `b`-frame batches to whoever is downstream.
pub struct MetricCollector {
    source: Arc<dyn MetricSource>,
    filter: Box<dyn Filter>,
    period: Duration,
    batch_size: usize,
    latest: Arc<AtomicShared<Vec<f64>>>,
}

impl MetricCollector {
    /// Builds a collector with the default cadence and batch size, no
    /// smoothing filter applied.
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self::with_filter(source, Box::new(NullFilter))
    }

    /// Builds a collector with a custom smoothing filter.
    pub fn with_filter(source: Arc<dyn MetricSource>, filter: Box<dyn Filter>) -> Self {
        let dims = source.dims();
        Self {
            source,
            filter,
            period: Duration::from_millis(METRIC_COLLECT_PERIOD_MS),
            batch_size: METRIC_BATCH_SIZE,
            latest: Arc::new(AtomicShared::new(vec![0.0; dims])),
        }
    }

    /// Overrides the sampling cadence, e.g. for tests.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Overrides the batch size, e.g. for tests.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Handle to the most recently published frame, readable without
    /// waiting on a batch boundary.
    pub fn latest_frame(&self) -> Arc<AtomicShared<Vec<f64>>> {
        self.latest.clone()
    }

    /// Runs the collection loop until `batches` is dropped by the receiver.
    /// Each completed `d x b` batch is sent in column-major frame order
    /// (column `j` is the frame collected at tick `j`).
    pub async fn run(mut self, batches: mpsc::Sender<DMatrix<f64>>) {
        let dims = self.source.dims();
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut pending: Vec<Vec<f64>> = Vec::with_capacity(self.batch_size);
        loop {
            ticker.tick().await;
            let raw = self.source.sample().await;
            let frame = self.filter.update(&raw);
            trace!(?frame, "collected metric frame");
            self.latest.store(frame.clone());
            pending.push(frame);

            if pending.len() == self.batch_size {
                let batch = DMatrix::from_fn(dims, self.batch_size, |r, c| pending[c][r]);
                debug!(rows = dims, cols = self.batch_size, "assembled metric batch");
                pending.clear();
                if batches.send(batch).await.is_err() {
                    debug!("batch receiver dropped, stopping collector");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticMetricSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn collector_emits_a_batch_after_batch_size_ticks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let source = Arc::new(StaticMetricSource::new(2, move || {
            let n = counter_clone.fetch_add(1, Ordering::SeqCst) as f64;
            vec![n, n * 2.0]
        }));

        let collector = MetricCollector::new(source)
            .with_period(Duration::from_millis(10))
            .with_batch_size(3);
        let latest = collector.latest_frame();

        let (tx, mut rx) = mpsc::channel(1);
        tokio::spawn(collector.run(tx));

        let batch = rx.recv().await.expect("batch sent");
        assert_eq!(batch.nrows(), 2);
        assert_eq!(batch.ncols(), 3);
        assert_eq!(batch.row(0).iter().copied().collect::<Vec<_>>(), vec![0.0, 1.0, 2.0]);
        assert_eq!(batch.row(1).iter().copied().collect::<Vec<_>>(), vec![0.0, 2.0, 4.0]);

        let published = latest.load();
        assert_eq!(*published, vec![2.0, 4.0]);
    }
}
