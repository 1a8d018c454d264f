//! Capacity estimator: wraps a [`KalmanFilter`] variant with the
//! monotonicity invariant (`per_pod_cost <= 0`) and the skip-on-noop
//! update rule.

use parking_lot::Mutex;

use shared::config::KalmanConfig;
use shared::error::ProntoResult;
use shared::types::PodCostFunc;

use crate::kalman::{Constant, KalmanFilter, OneD, TwoD};

/// Index of the per-pod cost component in a 2-D filter's state vector.
/// The 1-D and constant filters only ever carry index 0.
const COST_INDEX_TWO_D: usize = 1;

struct Inner {
    filter: Box<dyn KalmanFilter>,
    variant: PodCostFunc,
}

/// Thread-safe capacity/cost estimator for one node. `update` is the only
/// mutating entry point; `capacity_from_signal` and
/// `capacity_from_pod_count` are read-only projections of the current
/// state.
pub struct CapacityState {
    inner: Mutex<Inner>,
}

impl CapacityState {
    /// Build a capacity state running the filter variant selected by
    /// `--podcost-func`.
    pub fn new(variant: PodCostFunc, cfg: &KalmanConfig) -> ProntoResult<Self> {
        let filter: Box<dyn KalmanFilter> = match variant {
            PodCostFunc::Constant => Box::new(Constant::new(cfg)?),
            PodCostFunc::OneD => Box::new(OneD::new(cfg)?),
            PodCostFunc::TwoD => Box::new(TwoD::new(cfg)?),
        };
        Ok(Self {
            inner: Mutex::new(Inner { filter, variant }),
        })
    }

    /// Predict, then update with an observed `(pod_count, signal)` pair.
    /// Skipped entirely if both the predicted and observed signal are
    /// non-positive (nothing informative to learn). After a 2-D update,
    /// if the per-pod cost component became non-negative the update is
    /// reverted — a positive cost would mean more pods *increase*
    /// headroom, which never happens.
    pub fn update(&self, pod_count: f64, signal: f64) {
        let mut inner = self.inner.lock();
        inner.filter.predict();

        let x = inner.filter.state();
        let predicted = predicted_signal(&x, pod_count);
        if predicted <= 0.0 && signal <= 0.0 {
            return;
        }

        inner.filter.update(pod_count, signal);

        if inner.variant == PodCostFunc::TwoD {
            let new_x = inner.filter.state();
            if new_x[COST_INDEX_TWO_D] >= 0.0 {
                tracing::debug!("capacity filter cost went non-negative, reverting");
                inner.filter.revert();
            }
        }
    }

    /// Current state vector.
    pub fn state(&self) -> Vec<f64> {
        self.inner.lock().filter.state()
    }

    /// Pin the filter to a known-good state, bypassing the normal update
    /// path (used for tests and operator overrides).
    pub fn force_state(&self, new_x: &[f64]) -> ProntoResult<()> {
        self.inner.lock().filter.force_state(new_x)
    }

    /// Derive the node's remaining pod capacity from a signal value,
    /// using `capacity = -2 * signal / per_pod_cost`.
    pub fn capacity_from_signal(&self, signal: f64) -> f64 {
        let x = self.state();
        -signal * 2.0 / cost_of(&x)
    }

    /// Derive the node's remaining pod capacity given the current pod
    /// count, using `capacity = (-2 * capacity_offset / per_pod_cost) -
    /// pod_count`.
    pub fn capacity_from_pod_count(&self, pod_count: f64) -> f64 {
        let x = self.state();
        (-x[0] * 2.0 / cost_of(&x)) - pod_count
    }
}

fn predicted_signal(x: &[f64], pod_count: f64) -> f64 {
    match x.len() {
        1 => x[0],
        _ => x[0] + x[1] * pod_count,
    }
}

fn cost_of(x: &[f64]) -> f64 {
    if x.len() > 1 {
        x[1]
    } else {
        x[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_d_config() -> KalmanConfig {
        KalmanConfig {
            init_x: vec![1.4, -1.0],
            init_p: vec![1e-4, 0.0, 0.0, 1e-3],
            q: vec![1e-4, 0.0, 0.0, 1e-4],
            r: 1.0,
        }
    }

    #[test]
    fn update_is_skipped_when_nothing_is_predicted_or_observed() {
        let cs = CapacityState::new(PodCostFunc::TwoD, &two_d_config()).unwrap();
        cs.force_state(&[-0.1, -0.01]).unwrap();
        let before = cs.state();
        cs.update(0.0, 0.0);
        assert_eq!(cs.state(), before);
    }

    #[test]
    fn monotonicity_invariant_holds_across_many_updates() {
        let cs = CapacityState::new(PodCostFunc::TwoD, &two_d_config()).unwrap();
        for i in 0..200 {
            let pod_count = (i % 7) as f64;
            let signal = 1.4 - 1.0 * pod_count + 0.05 * ((i as f64).sin());
            cs.update(pod_count, signal);
            assert!(cs.state()[1] <= 0.0, "per-pod cost must never go positive");
        }
    }

    #[test]
    fn capacity_from_signal_matches_the_formula() {
        let cs = CapacityState::new(PodCostFunc::TwoD, &two_d_config()).unwrap();
        cs.force_state(&[1.0, -0.5]).unwrap();
        assert!((cs.capacity_from_signal(1.0) - 4.0).abs() < 1e-9);
    }
}
