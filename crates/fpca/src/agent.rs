//! Per-node FPCA cycle: local subspace tracking plus aggregator rendezvous.
//! Grounded in the batch cycle of `fpca.FPCAAgent` — this is a direct port
//! of `RunLocalUpdates`/`FPCAEdge`, restructured as an explicit per-batch
//! call instead of an infinite goroutine loop so the collector's batch
//! channel drives it.

use std::sync::Arc;

use nalgebra::DMatrix;
use shared::utils::AtomicShared;
use tracing::{debug, warn};

use crate::client::AggregatorClient;

pub use matrix::MatrixError;

/// Errors from the matrix kernel operations the cycle depends on. Aggregator
/// RPC failures are not represented here: they are recoverable by design
/// and handled by skipping the global-merge step, not by propagating an
/// error.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FpcaError {
    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

pub type FpcaResult<T> = Result<T, FpcaError>;

/// Subspace tracked locally plus the one shared with the aggregator.
struct Subspace {
    u: DMatrix<f64>,
    sigma: Vec<f64>,
}

/// Federated incremental PCA agent. Owns `U_L,Sigma_L` (the purely local
/// subspace), `U,Sigma` (the one exchanged with the aggregator), `last_U`
/// (for the approximate-equality gate), and the published sum-projection
/// vector `p`.
pub struct FPCAAgent {
    r: usize,
    forget: f64,
    enhance: f64,
    alpha: f64,
    beta: f64,
    epsilon: f64,
    adaptive: bool,

    local: Option<Subspace>,
    global: Option<Subspace>,
    last_u: Option<DMatrix<f64>>,

    p: Arc<AtomicShared<Vec<f64>>>,
}

impl FPCAAgent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(r: usize, forget: f64, enhance: f64, alpha: f64, beta: f64, epsilon: f64, adaptive: bool) -> Self {
        Self {
            r,
            forget,
            enhance,
            alpha,
            beta,
            epsilon,
            adaptive,
            local: None,
            global: None,
            last_u: None,
            p: Arc::new(AtomicShared::default()),
        }
    }

    /// Handle to the published sum-projection vector, read lock-free by the
    /// signal calculator.
    pub fn p(&self) -> Arc<AtomicShared<Vec<f64>>> {
        self.p.clone()
    }

    /// Current working rank, mutated by `rank_adjust` in adaptive mode.
    pub fn rank(&self) -> usize {
        self.r
    }

    /// Runs one per-batch cycle against `batch` (a `d x b` metric matrix),
    /// exchanging with the aggregator through `agg` when needed.
    pub async fn process_batch(
        &mut self,
        batch: &DMatrix<f64>,
        agg: &dyn AggregatorClient,
    ) -> FpcaResult<()> {
        if self.global.is_none() {
            self.first_batch(batch, agg).await
        } else {
            self.subsequent_batch(batch, agg).await
        }
    }

    async fn first_batch(&mut self, batch: &DMatrix<f64>, agg: &dyn AggregatorClient) -> FpcaResult<()> {
        let (u_l, sigma_l) = matrix::svd_r(batch, self.r)?;
        self.local = Some(Subspace {
            u: u_l.clone(),
            sigma: sigma_l.clone(),
        });
        self.global = Some(Subspace {
            u: u_l.clone(),
            sigma: sigma_l.clone(),
        });

        let u_sigma = matrix::u_sigma(&u_l, &sigma_l);
        if let Some((u, sigma)) = self.exchange_with_aggregator(&u_sigma, batch, agg).await? {
            self.global = Some(Subspace { u, sigma });
        }

        self.finish_cycle();
        Ok(())
    }

    async fn subsequent_batch(&mut self, batch: &DMatrix<f64>, agg: &dyn AggregatorClient) -> FpcaResult<()> {
        let local = self.local.as_ref().expect("local subspace seeded by first batch");
        let ones = vec![1.0; batch.ncols()];
        let (u_l, sigma_l) = matrix::merge(&local.u, &local.sigma, batch, &ones, self.r, self.forget, self.enhance)?;

        let global = self.global.as_ref().expect("global subspace seeded by first batch");
        let global_u_sigma = matrix::u_sigma(&global.u, &global.sigma);
        let local_u_sigma = matrix::u_sigma(&u_l, &sigma_l);

        let merge_rank = if self.adaptive { self.r + 1 } else { self.r };
        let (mid_u, mid_sigma) = matrix::agg_merge(&global_u_sigma, &local_u_sigma, merge_rank)?;

        let (u, sigma) = if self.adaptive {
            let (u, sigma) = matrix::rank_adjust(&mid_u, &mid_sigma, self.r, self.alpha, self.beta)?;
            self.r = sigma.len();
            (u, sigma)
        } else {
            (mid_u, mid_sigma)
        };

        self.local = Some(Subspace { u: u_l, sigma: sigma_l });
        self.global = Some(Subspace { u: u.clone(), sigma: sigma.clone() });

        if !subspace_close(&u, self.last_u.as_ref(), self.epsilon) {
            let u_sigma = matrix::u_sigma(&u, &sigma);
            if let Some((merged_u, merged_sigma)) = self.exchange_with_aggregator(&u_sigma, batch, agg).await? {
                self.global = Some(Subspace {
                    u: merged_u,
                    sigma: merged_sigma,
                });
            }
        } else {
            debug!("U unchanged within epsilon, skipping aggregator exchange");
        }

        self.finish_cycle();
        Ok(())
    }

    /// Submits `u_sigma` and, on a non-empty reply, builds `Sigma_A` from
    /// `batch` and merges `(U_A, Sigma_A)` with `u_sigma` at rank `r`.
    /// Returns `None` (no-op for the caller) on any aggregator failure.
    async fn exchange_with_aggregator(
        &self,
        u_sigma: &DMatrix<f64>,
        batch: &DMatrix<f64>,
        agg: &dyn AggregatorClient,
    ) -> FpcaResult<Option<(DMatrix<f64>, Vec<f64>)>> {
        let Some(u_a) = agg.request_agg_merge(u_sigma).await else {
            warn!("aggregator rendezvous skipped this cycle, degrading to local updates");
            return Ok(None);
        };
        let sigma_a = matrix::sigma_from_projection(&u_a, batch)?;
        let agg_u_sigma = matrix::u_sigma(&u_a, &sigma_a);
        let merged = matrix::agg_merge(&agg_u_sigma, u_sigma, self.r)?;
        Ok(Some(merged))
    }

    fn finish_cycle(&mut self) {
        let global = self.global.as_ref().expect("global subspace always set by end of cycle");
        let p = matrix::sum_projection(&global.u, &global.sigma);
        self.p.store(p);
        self.last_u = Some(global.u.clone());
    }
}

/// Approximate equality gate for `U`: Frobenius-norm of the difference
/// against `epsilon`, matching `mat.EqualApprox`'s role in the source.
/// A missing `last_u` (no prior cycle) is never close.
fn subspace_close(u: &DMatrix<f64>, last_u: Option<&DMatrix<f64>>, epsilon: f64) -> bool {
    match last_u {
        Some(last) if last.shape() == u.shape() => {
            let diff = u - last;
            diff.iter().map(|v| v * v).sum::<f64>().sqrt() < epsilon
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::FixedAggregatorClient;
    use std::sync::atomic::Ordering;

    fn batch(rows: usize, cols: usize, seed: f64) -> DMatrix<f64> {
        DMatrix::from_fn(rows, cols, |i, j| seed + i as f64 * 0.1 + j as f64 * 0.01)
    }

    #[tokio::test]
    async fn first_batch_seeds_the_subspace_and_publishes_p() {
        let mut agent = FPCAAgent::new(2, 0.9, 1.1, 0.05, 0.5, 1e-6, false);
        let agg = FixedAggregatorClient {
            reply: None,
            calls: Default::default(),
        };
        let b = batch(4, 8, 1.0);
        agent.process_batch(&b, &agg).await.unwrap();

        assert_eq!(agg.calls.load(Ordering::SeqCst), 1);
        let p = agent.p().load();
        assert_eq!(p.len(), 4);
        assert!(p.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[tokio::test]
    async fn aggregator_failure_degrades_to_local_update_without_erroring() {
        let mut agent = FPCAAgent::new(2, 0.9, 1.1, 0.05, 0.5, 1e-6, false);
        let agg = FixedAggregatorClient {
            reply: None,
            calls: Default::default(),
        };
        let b1 = batch(4, 8, 1.0);
        let b2 = batch(4, 8, 2.0);
        agent.process_batch(&b1, &agg).await.unwrap();
        agent.process_batch(&b2, &agg).await.unwrap();

        let p = agent.p().load();
        assert_eq!(p.len(), 4);
    }

    #[tokio::test]
    async fn adaptive_mode_can_adjust_the_working_rank() {
        let mut agent = FPCAAgent::new(2, 0.9, 1.1, 0.9, 0.95, 1e-9, true);
        let agg = FixedAggregatorClient {
            reply: None,
            calls: Default::default(),
        };
        let b1 = batch(4, 8, 1.0);
        agent.process_batch(&b1, &agg).await.unwrap();
        let b2 = batch(4, 8, 5.0);
        agent.process_batch(&b2, &agg).await.unwrap();

        // rank_adjust only ever moves the working rank by one step.
        assert!((1..=3).contains(&agent.rank()));
    }
}
