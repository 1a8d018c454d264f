//! Central FPCA aggregator: a bounded submission queue feeding a single
//! reducer thread, publishing the current aggregate `U` for lock-free reads
//! by every `RequestAggMerge` caller.
//!
//! Grounded in `src/aggregate/aggregator.go` (queue + reducer thread,
//! `sync/atomic.Pointer` publication) and `src/aggregate/server.go`
//! (`RequestAggMerge`'s enqueue-then-load contract: the returned `U` is
//! best-effort and may not yet reflect the caller's own submission).

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Sender};
use nalgebra::DMatrix;
use shared::utils::AtomicShared;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors surfaced to a caller of [`Aggregator::submit`].
#[derive(Error, Debug, PartialEq)]
pub enum AggregatorError {
    /// The reducer thread has exited; the queue no longer has a receiver.
    #[error("aggregator reducer thread is no longer running")]
    ReducerStopped,
}

/// Central, single-writer aggregator. Holds no lock on the hot path: the
/// reducer is the only writer of the published `U`, and readers take an
/// `Arc` clone through [`shared::utils::AtomicShared`].
pub struct Aggregator {
    sender: Sender<DMatrix<f64>>,
    published_u: Arc<AtomicShared<Option<DMatrix<f64>>>>,
    reducer: Option<JoinHandle<()>>,
}

impl Aggregator {
    /// Spawns the reducer thread and returns a handle to submit against it.
    /// `queue_capacity` bounds the number of pending `UΣ` submissions; once
    /// full, `submit` blocks the caller rather than dropping anything, to
    /// preserve submission order as causality.
    pub fn spawn(r: usize, queue_capacity: usize) -> Self {
        let (sender, receiver) = bounded(queue_capacity);
        let published_u = Arc::new(AtomicShared::default());
        let published_for_reducer = published_u.clone();

        let reducer = std::thread::Builder::new()
            .name("aggregator-reducer".into())
            .spawn(move || reduce_loop(r, receiver, published_for_reducer))
            .expect("failed to spawn aggregator reducer thread");

        Self {
            sender,
            published_u,
            reducer: Some(reducer),
        }
    }

    /// Enqueues `u_sigma` for the reducer without waiting on the result,
    /// running the (potentially blocking) channel send on a blocking-pool
    /// thread so async callers never stall the runtime.
    pub async fn submit(&self, u_sigma: DMatrix<f64>) -> Result<(), AggregatorError> {
        let sender = self.sender.clone();
        tokio::task::spawn_blocking(move || sender.send(u_sigma))
            .await
            .expect("aggregator submission task panicked")
            .map_err(|_| AggregatorError::ReducerStopped)
    }

    /// Blocking form of [`Aggregator::submit`], for synchronous callers and
    /// tests.
    pub fn submit_blocking(&self, u_sigma: DMatrix<f64>) -> Result<(), AggregatorError> {
        self.sender.send(u_sigma).map_err(|_| AggregatorError::ReducerStopped)
    }

    /// Current published aggregate `U`, or `None` if the reducer has not
    /// processed a first submission yet.
    pub fn current_u(&self) -> Option<DMatrix<f64>> {
        (*self.published_u.load()).clone()
    }

    /// The `RequestAggMerge` contract: enqueue, then return whatever `U` is
    /// currently published. The reply may not include this submission's
    /// contribution yet; the caller is expected to submit again next cycle.
    pub async fn request_agg_merge(&self, u_sigma_in: DMatrix<f64>) -> Option<DMatrix<f64>> {
        if let Err(err) = self.submit(u_sigma_in).await {
            warn!(error = %err, "submission dropped, reducer thread is gone");
        }
        self.current_u()
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        if let Some(handle) = self.reducer.take() {
            if !handle.is_finished() {
                debug!("aggregator dropped with reducer thread still running, detaching");
            }
        }
    }
}

fn reduce_loop(r: usize, receiver: crossbeam::channel::Receiver<DMatrix<f64>>, published: Arc<AtomicShared<Option<DMatrix<f64>>>>) {
    let mut agg_u_sigma: Option<DMatrix<f64>> = None;

    for input in receiver.iter() {
        agg_u_sigma = match agg_u_sigma.take() {
            None => match matrix::svd_r(&input, r) {
                Ok((u, sigma)) => {
                    published.store(Some(u.clone()));
                    Some(matrix::u_sigma(&u, &sigma))
                }
                Err(err) => {
                    warn!(error = %err, "first aggregator submission rejected, waiting for another");
                    None
                }
            },
            Some(prev) => match matrix::agg_merge(&prev, &input, r) {
                Ok((u, sigma)) => {
                    published.store(Some(u.clone()));
                    Some(matrix::u_sigma(&u, &sigma))
                }
                Err(err) => {
                    warn!(error = %err, "aggregator merge rejected a submission, keeping prior aggregate");
                    Some(prev)
                }
            },
        };
    }
    debug!("aggregator reducer loop exiting, submission channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_submission_seeds_the_published_aggregate() {
        let agg = Aggregator::spawn(2, 4);
        assert!(agg.current_u().is_none());

        let input = DMatrix::from_row_slice(4, 3, &[
            5.0, 0.0, 0.0,
            0.0, 3.0, 0.0,
            0.0, 0.0, 0.0,
            0.0, 0.0, 0.0,
        ]);
        agg.submit_blocking(input).unwrap();

        // give the reducer thread a moment to process.
        std::thread::sleep(std::time::Duration::from_millis(50));
        let u = agg.current_u().expect("reducer published a U");
        assert_eq!(u.ncols(), 2);
        assert_eq!(u.nrows(), 4);
    }

    #[tokio::test]
    async fn request_agg_merge_returns_best_effort_current_u() {
        let agg = Aggregator::spawn(2, 4);
        let input = DMatrix::from_row_slice(4, 3, &[
            5.0, 0.0, 0.0,
            0.0, 3.0, 0.0,
            0.0, 0.0, 0.0,
            0.0, 0.0, 0.0,
        ]);
        // first call: reducer hasn't necessarily processed it yet, so None
        // is an acceptable reply, but it must not error.
        let _ = agg.request_agg_merge(input.clone()).await;

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let second = agg.request_agg_merge(input).await;
        assert!(second.is_some());
    }
}
