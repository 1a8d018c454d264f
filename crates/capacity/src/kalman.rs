//! Kalman capacity/cost filters. A node's signal is modeled as
//! `signal ≈ x[0] + x[1] * pod_count`: `x[0]` is the capacity offset (how
//! much headroom exists with zero pods scheduled) and `x[1]` is the
//! per-pod cost, which a healthy node keeps non-positive (more pods only
//! ever lower headroom).
//!
//! Three variants share one capability set, selected at startup via
//! `--podcost-func`: [`Constant`] (state never updates), [`OneD`] (a
//! single scalar cost, capacity offset fixed), and [`TwoD`] (full 2-state
//! filter). All three expose the same [`KalmanFilter`] trait so the
//! capacity estimator above them does not need to know which is running.

use shared::error::{ProntoError, ProntoResult};
use shared::config::KalmanConfig;

/// Shared capability set across all podcost-function variants.
pub trait KalmanFilter: Send {
    /// Time-update step: advance uncertainty, state unchanged (random walk).
    fn predict(&mut self);

    /// Measurement-update step. `u` is the pod count (the observation's
    /// input), `y` is the observed signal.
    fn update(&mut self, u: f64, y: f64);

    /// Current state estimate.
    fn state(&self) -> Vec<f64>;

    /// Overwrite the state directly (used after a plausibility check
    /// fails and a caller wants to pin a known-good value).
    fn force_state(&mut self, new_x: &[f64]) -> ProntoResult<()>;

    /// Undo the most recent `update` (and its paired `predict`), restoring
    /// the previous state and covariance. A no-op for filters with no
    /// history (`Constant`).
    fn revert(&mut self);
}

/// No-op filter: state fixed at construction. Used for nodes where
/// per-pod cost is assumed constant (`--podcost-func=const`).
pub struct Constant {
    x: [f64; 1],
}

impl Constant {
    pub fn new(cfg: &KalmanConfig) -> ProntoResult<Self> {
        if cfg.init_x.len() != 1 {
            return Err(ProntoError::Configuration(
                "initX must have length 1 for the constant filter".into(),
            ));
        }
        Ok(Self { x: [cfg.init_x[0]] })
    }
}

impl KalmanFilter for Constant {
    fn predict(&mut self) {}
    fn update(&mut self, _u: f64, _y: f64) {}
    fn state(&self) -> Vec<f64> {
        self.x.to_vec()
    }
    fn force_state(&mut self, new_x: &[f64]) -> ProntoResult<()> {
        if new_x.len() != 1 {
            return Err(ProntoError::Configuration(
                "initX must have length 1 for the constant filter".into(),
            ));
        }
        self.x[0] = new_x[0];
        Ok(())
    }
    fn revert(&mut self) {}
}

/// 1-D filter: a single scalar cost state, `signal ≈ u * x[0]`.
pub struct OneD {
    x: [f64; 1],
    p: f64,
    q: f64,
    r: f64,
}

impl OneD {
    pub fn new(cfg: &KalmanConfig) -> ProntoResult<Self> {
        if cfg.init_x.len() != 1 || cfg.init_p.len() != 1 || cfg.q.len() != 1 {
            return Err(ProntoError::Configuration(
                "initX, initP and Q must each have length 1 for the 1-D filter".into(),
            ));
        }
        Ok(Self {
            x: [cfg.init_x[0]],
            p: cfg.init_p[0],
            q: cfg.q[0],
            r: cfg.r,
        })
    }
}

impl KalmanFilter for OneD {
    fn predict(&mut self) {
        self.p += self.q;
    }

    fn update(&mut self, u: f64, y: f64) {
        if u == 0.0 {
            tracing::warn!("KalmanFilter1D.update called with u=0: skipping update");
            return;
        }
        let s = u * u * self.p + self.r;
        let k = (self.p * u) / s;
        let r = y - u * self.x[0];
        self.x[0] += k * r;
        self.p *= 1.0 - k * u;

        let sigma = s.sqrt();
        if r.abs() > 3.0 * sigma {
            tracing::debug!(residual = r, three_sigma = 3.0 * sigma, "large Kalman residual");
        }
    }

    fn state(&self) -> Vec<f64> {
        self.x.to_vec()
    }

    fn force_state(&mut self, new_x: &[f64]) -> ProntoResult<()> {
        if new_x.len() != 1 {
            return Err(ProntoError::Configuration(
                "initX must have length 1 for the 1-D filter".into(),
            ));
        }
        self.x[0] = new_x[0];
        Ok(())
    }

    // The 1-D filter keeps no separate history buffer; reverting is a no-op
    // to match the original filter's behavior.
    fn revert(&mut self) {}
}

/// 2-D filter: `x = [capacity_offset, per_pod_cost]`,
/// `signal ≈ x[0] + x[1] * pod_count`.
pub struct TwoD {
    x: [f64; 2],
    prev_x: [f64; 2],
    p: [[f64; 2]; 2],
    prev_p: [[f64; 2]; 2],
    q: [[f64; 2]; 2],
    r: f64,
}

impl TwoD {
    pub fn new(cfg: &KalmanConfig) -> ProntoResult<Self> {
        if cfg.init_x.len() != 2 || cfg.init_p.len() != 4 || cfg.q.len() != 4 {
            return Err(ProntoError::Configuration(
                "initX must have length 2 and initP/Q must have length 4 for the 2-D filter"
                    .into(),
            ));
        }
        let x = [cfg.init_x[0], cfg.init_x[1]];
        let p = [[cfg.init_p[0], cfg.init_p[1]], [cfg.init_p[2], cfg.init_p[3]]];
        let q = [[cfg.q[0], cfg.q[1]], [cfg.q[2], cfg.q[3]]];
        Ok(Self {
            x,
            prev_x: x,
            p,
            prev_p: p,
            q,
            r: cfg.r,
        })
    }

    /// Measurement update for the capacity offset only (`u == 0`,
    /// `H = [1, 0]`); the cost component is left untouched because it was
    /// not observed this tick.
    fn update_offset_only(&mut self, y: f64) {
        let s00 = self.p[0][0] + self.r;
        let k0 = self.p[0][0] / s00;
        let residual = y - self.x[0];

        self.x[0] += k0 * residual;
        self.p[0][0] = (1.0 - k0) * self.p[0][0];
        self.p[0][1] = 0.0;
        self.p[1][0] = 0.0;
    }
}

impl KalmanFilter for TwoD {
    fn predict(&mut self) {
        for i in 0..2 {
            for j in 0..2 {
                self.p[i][j] += self.q[i][j];
            }
        }
    }

    fn update(&mut self, u: f64, y: f64) {
        if u == 0.0 {
            self.update_offset_only(y);
            return;
        }

        let s = self.p[0][0] + self.p[0][1] * u + self.p[1][0] * u + self.p[1][1] * u * u + self.r;
        let k0 = (self.p[0][0] + self.p[0][1] * u) / s;
        let k1 = (self.p[1][0] + self.p[1][1] * u) / s;

        let pred_y = self.x[0] + self.x[1] * u;
        let residual = y - pred_y;

        self.prev_x = self.x;
        self.x[0] += k0 * residual;
        self.x[1] += k1 * residual;

        let m00 = 1.0 - k0;
        let m01 = -k0 * u;
        let m10 = -k1;
        let m11 = 1.0 - k1 * u;

        self.prev_p = self.p;
        self.p[0][0] = m00 * self.prev_p[0][0] + m01 * self.prev_p[1][0];
        self.p[0][1] = m00 * self.prev_p[0][1] + m01 * self.prev_p[1][1];
        self.p[1][0] = m10 * self.prev_p[0][0] + m11 * self.prev_p[1][0];
        self.p[1][1] = m10 * self.prev_p[0][1] + m11 * self.prev_p[1][1];
    }

    fn state(&self) -> Vec<f64> {
        self.x.to_vec()
    }

    fn force_state(&mut self, new_x: &[f64]) -> ProntoResult<()> {
        if new_x.len() != 2 {
            return Err(ProntoError::Configuration(
                "initX must have length 2 for the 2-D filter".into(),
            ));
        }
        self.x[0] = new_x[0];
        self.x[1] = new_x[1];
        Ok(())
    }

    fn revert(&mut self) {
        self.x = self.prev_x;
        self.p = self.prev_p;
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
    fn two_d_rejects_a_malformed_config() {
        let mut cfg = two_d_config();
        cfg.init_x.push(0.0);
        assert!(TwoD::new(&cfg).is_err());
    }

    #[test]
    fn two_d_predict_increases_covariance() {
        let mut kf = TwoD::new(&two_d_config()).unwrap();
        let before = kf.p;
        kf.predict();
        assert!(kf.p[0][0] > before[0][0]);
        assert!(kf.p[1][1] > before[1][1]);
    }

    #[test]
    fn two_d_update_moves_state_toward_the_observation() {
        let mut kf = TwoD::new(&two_d_config()).unwrap();
        kf.predict();
        let before = kf.state();
        kf.update(3.0, 0.5);
        let after = kf.state();
        assert_ne!(before, after);
    }

    #[test]
    fn two_d_revert_restores_the_pre_update_state() {
        let mut kf = TwoD::new(&two_d_config()).unwrap();
        kf.predict();
        let before = kf.state();
        kf.update(3.0, 0.5);
        kf.revert();
        assert_eq!(kf.state(), before);
    }

    #[test]
    fn constant_never_changes_state() {
        let cfg = KalmanConfig {
            init_x: vec![2.0],
            init_p: vec![],
            q: vec![],
            r: 0.0,
        };
        let mut kf = Constant::new(&cfg).unwrap();
        kf.predict();
        kf.update(5.0, 1.0);
        assert_eq!(kf.state(), vec![2.0]);
    }
}
