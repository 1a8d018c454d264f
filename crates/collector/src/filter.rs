//! Optional adaptive low-pass filter applied to raw metric frames before
//! they enter the batch buffer: a per-dimension EMA whose rate depends on
//! the direction of the latest move and how many consecutive samples have
//! moved the same way.

/// A filter stage the collector can apply to each incoming frame.
pub trait Filter: Send {
    /// Filter a new raw frame, returning the value to record.
    fn update(&mut self, raw: &[f64]) -> Vec<f64>;
}

/// Passthrough filter: the collector's default when no smoothing is
/// configured.
#[derive(Debug, Default)]
pub struct NullFilter;

impl Filter for NullFilter {
    fn update(&mut self, raw: &[f64]) -> Vec<f64> {
        raw.to_vec()
    }
}

/// Dynamic dual-rate EMA: a "low" rate while a dimension keeps moving in a
/// new direction, escalating to a "high" rate once `noise_window`
/// consecutive samples have moved the same way (the move is no longer
/// noise, so the filter tracks it faster).
pub struct DynEma {
    alpha_up_low: f64,
    alpha_down_low: f64,
    alpha_up_high: f64,
    alpha_down_high: f64,
    noise_window: u32,

    up_count: Vec<u32>,
    down_count: Vec<u32>,
    y: Option<Vec<f64>>,
}

impl DynEma {
    pub fn new(
        alpha_up_low: f64,
        alpha_down_low: f64,
        alpha_up_high: f64,
        alpha_down_high: f64,
        noise_window: u32,
    ) -> Self {
        Self {
            alpha_up_low,
            alpha_down_low,
            alpha_up_high,
            alpha_down_high,
            noise_window,
            up_count: Vec::new(),
            down_count: Vec::new(),
            y: None,
        }
    }
}

impl Filter for DynEma {
    fn update(&mut self, raw: &[f64]) -> Vec<f64> {
        let Some(y) = self.y.as_mut() else {
            self.y = Some(raw.to_vec());
            self.up_count = vec![0; raw.len()];
            self.down_count = vec![0; raw.len()];
            return raw.to_vec();
        };

        for ((old, &unfiltered), (up_count, down_count)) in y
            .iter_mut()
            .zip(raw.iter())
            .zip(self.up_count.iter_mut().zip(self.down_count.iter_mut()))
        {
            let alpha = if unfiltered > *old {
                *up_count += 1;
                *down_count = 0;
                if *up_count >= self.noise_window {
                    self.alpha_up_high
                } else {
                    self.alpha_up_low
                }
            } else if unfiltered < *old {
                *down_count += 1;
                *up_count = 0;
                if *down_count >= self.noise_window {
                    self.alpha_down_high
                } else {
                    self.alpha_down_low
                }
            } else {
                *up_count = 0;
                *down_count = 0;
                self.alpha_down_low
            };
            *old = alpha * unfiltered + (1.0 - alpha) * *old;
        }
        y.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_filter_passes_values_through_unchanged() {
        let mut f = NullFilter;
        assert_eq!(f.update(&[0.3, 0.7]), vec![0.3, 0.7]);
    }

    #[test]
    fn dyn_ema_first_sample_is_passed_through() {
        let mut f = DynEma::new(0.5, 0.5, 0.9, 0.9, 3);
        assert_eq!(f.update(&[0.2]), vec![0.2]);
    }

    #[test]
    fn dyn_ema_converges_on_a_constant_stream() {
        let mut f = DynEma::new(0.5, 0.5, 0.9, 0.9, 3);
        f.update(&[0.0]);
        let mut last = vec![0.0];
        for _ in 0..50 {
            last = f.update(&[1.0]);
        }
        assert!((last[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dyn_ema_escalates_to_the_high_rate_after_the_noise_window() {
        let mut f = DynEma::new(0.1, 0.1, 0.9, 0.9, 2);
        f.update(&[0.0]);
        let after_one = f.update(&[1.0])[0];
        f.update(&[2.0]);
        let after_three = f.update(&[3.0])[0];
        // Once escalated, each step should close a much larger fraction of
        // the remaining gap than the first (low-rate) step did.
        let gap_one = 1.0 - after_one;
        let gap_three = 3.0 - after_three;
        assert!(gap_three / 3.0 < gap_one);
    }
}
