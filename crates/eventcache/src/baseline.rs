//! Sliding-window baseline/oversaturation estimator and the overprovision
//! counter it drives.

/// Tracks a lower-percentile baseline service time and flags
/// oversaturation from the mean-of-squares of a sliding window of pod
/// lifetimes, using incremental (not recomputed-from-scratch) updates.
pub struct BaselineEstimator {
    window_size: usize,
    alpha_down: f64,
    alpha_up: f64,
    beta: f64,
    percentile: f64,

    window: Vec<f64>,
    pos: usize,
    n_full: usize,
    sum_sq: f64,

    /// Current EMA baseline, `S_est`.
    s_est: f64,
}

impl BaselineEstimator {
    /// `window_size`: samples retained. `alpha_down`/`alpha_up`: EMA rates
    /// for below/above-baseline samples. `beta`: allowed slowdown
    /// multiplier. `percentile`: lower-tail percentile used for the
    /// baseline update (e.g. 0.10).
    pub fn new(window_size: usize, alpha_down: f64, alpha_up: f64, beta: f64, percentile: f64) -> Self {
        Self {
            window_size,
            alpha_down,
            alpha_up,
            beta,
            percentile,
            window: vec![0.0; window_size],
            pos: 0,
            n_full: 0,
            sum_sq: 0.0,
            s_est: 0.0,
        }
    }

    /// Feed a newly observed pod lifetime `s` (seconds). Returns whether
    /// this completion is considered oversaturated. During the initial
    /// fill phase (window not yet full) every sample counts as
    /// oversaturated, matching the source's conservative startup bias.
    pub fn add_sample(&mut self, s: f64) -> bool {
        if self.n_full == self.window_size {
            let old = self.window[self.pos];
            self.sum_sq -= old * old;
        } else {
            self.n_full += 1;
        }

        self.window[self.pos] = s;
        self.sum_sq += s * s;
        self.pos = (self.pos + 1) % self.window_size;

        if self.n_full < self.window_size {
            self.s_est += s / self.window_size as f64;
            return true;
        }

        let n = self.window_size;
        let mut sorted = self.window.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let idx = ((self.percentile * n as f64).ceil() as isize - 1).clamp(0, n as isize - 1) as usize;
        let recent_low = sorted[idx];

        let mean_sq = self.sum_sq / n as f64;
        let baseline = self.s_est;
        let threshold = (self.beta * baseline).powi(2);
        let oversaturated = mean_sq > threshold;

        if self.s_est == 0.0 {
            self.s_est = recent_low;
        } else {
            let alpha = if recent_low < self.s_est {
                self.alpha_down
            } else {
                self.alpha_up
            };
            self.s_est = alpha * recent_low + (1.0 - alpha) * self.s_est;
        }

        oversaturated
    }
}

/// Overprovision counter: halved (rounded down) on an oversaturated
/// completion, incremented otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct OverprovisionCounter(u32);

impl OverprovisionCounter {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn observe(&mut self, oversaturated: bool) {
        if oversaturated {
            self.0 /= 2;
        } else {
            self.0 += 1;
        }
    }
}
