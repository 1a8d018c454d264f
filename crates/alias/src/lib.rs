//! Walker's alias method: O(1) weighted sampling from a discrete
//! distribution, plus a central wrapper that remaps sampled indices to
//! caller-supplied node indices and caps how many draws a table serves
//! before it must be rebuilt.

use rand::Rng;
use thiserror::Error;

/// Errors constructing or sampling a table.
#[derive(Error, Debug, PartialEq)]
pub enum AliasError {
    #[error("weights slice cannot be empty")]
    Empty,
    #[error("weights cannot be negative")]
    Negative,
    #[error("sum of weights must be positive")]
    NonPositiveSum,
    #[error("idxs slice and weights slice must be the same length")]
    IdxsLengthMismatch,
    #[error("max samples must be greater than 0")]
    InvalidMaxSamples,
    #[error("no more samples remaining")]
    Exhausted,
}

pub type AliasResult<T> = Result<T, AliasError>;

/// Raw Walker's-method table over `0..n`. Construction is O(n); each
/// [`AliasTable::sample`] is O(1).
pub struct AliasTable {
    n: usize,
    prob: Vec<f64>,
    alias: Vec<usize>,
}

impl AliasTable {
    /// Build a table from non-negative weights summing to a positive
    /// value. One entry per outcome, in the same order as `weights`.
    pub fn new(weights: &[f64]) -> AliasResult<Self> {
        let n = weights.len();
        if n == 0 {
            return Err(AliasError::Empty);
        }

        let mut sum = 0.0;
        for &w in weights {
            if w < 0.0 {
                return Err(AliasError::Negative);
            }
            sum += w;
        }
        if sum <= 0.0 {
            return Err(AliasError::NonPositiveSum);
        }

        let mut prob = vec![0.0; n];
        let mut alias = vec![0usize; n];
        let mut norm_prob: Vec<f64> = weights.iter().map(|&w| w * n as f64 / sum).collect();

        let mut small: Vec<usize> = Vec::with_capacity(n);
        let mut large: Vec<usize> = Vec::with_capacity(n);
        for (i, &p) in norm_prob.iter().enumerate() {
            if p < 1.0 {
                small.push(i);
            } else {
                large.push(i);
            }
        }

        while let (Some(s), Some(l)) = (small.pop(), large.pop()) {
            prob[s] = norm_prob[s];
            alias[s] = l;

            norm_prob[l] -= 1.0 - norm_prob[s];
            if norm_prob[l] < 1.0 {
                small.push(l);
            } else {
                large.push(l);
            }
        }

        for idx in large.into_iter().chain(small.into_iter()) {
            prob[idx] = 1.0;
        }

        Ok(Self { n, prob, alias })
    }

    /// Draw one outcome index in `0..n`.
    pub fn sample(&self, rng: &mut impl Rng) -> usize {
        let i = rng.gen_range(0..self.n);
        if rng.gen::<f64>() < self.prob[i] {
            i
        } else {
            self.alias[i]
        }
    }
}

/// Central wrapper: remaps sampled outcomes to caller node indices and
/// enforces a max-samples countdown so the dispatcher rebuilds the table
/// on a bounded cadence instead of relying on staleness alone.
pub struct CtlAliasTable {
    table: AliasTable,
    idxs: Option<Vec<usize>>,
    samples_remaining: Option<u32>,
}

impl CtlAliasTable {
    /// Build from raw weights; no index remap, no sample cap.
    pub fn new(weights: &[f64]) -> AliasResult<Self> {
        Ok(Self {
            table: AliasTable::new(weights)?,
            idxs: None,
            samples_remaining: None,
        })
    }

    /// Attach a node-index remap: `sample()` returns `idxs[i]` instead of
    /// the raw outcome `i`. Must be the same length as the weights the
    /// table was built from.
    pub fn with_idxs(mut self, idxs: Vec<usize>) -> AliasResult<Self> {
        if idxs.len() != self.table.n {
            return Err(AliasError::IdxsLengthMismatch);
        }
        self.idxs = Some(idxs);
        Ok(self)
    }

    /// Cap the number of draws this table will serve before
    /// [`CtlAliasTable::sample`] starts returning [`AliasError::Exhausted`].
    pub fn with_max_samples(mut self, samples: u32) -> AliasResult<Self> {
        if samples == 0 {
            return Err(AliasError::InvalidMaxSamples);
        }
        self.samples_remaining = Some(samples);
        Ok(self)
    }

    /// Draw one node index, decrementing the sample countdown if set.
    pub fn sample(&mut self, rng: &mut impl Rng) -> AliasResult<usize> {
        if let Some(remaining) = self.samples_remaining {
            if remaining == 0 {
                return Err(AliasError::Exhausted);
            }
        }
        let idx = self.table.sample(rng);
        if let Some(remaining) = self.samples_remaining.as_mut() {
            *remaining -= 1;
        }
        Ok(self.idxs.as_ref().map_or(idx, |idxs| idxs[idx]))
    }

    /// Whether another `sample()` call would succeed.
    pub fn samples_left(&self) -> bool {
        self.samples_remaining.map_or(true, |remaining| remaining > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn rejects_empty_weights() {
        assert_eq!(AliasTable::new(&[]), Err(AliasError::Empty).map(|_: AliasTable| ()).map_err(|e| e));
    }

    #[test]
    fn rejects_negative_weights() {
        assert!(matches!(AliasTable::new(&[1.0, -1.0]), Err(AliasError::Negative)));
    }

    #[test]
    fn rejects_all_zero_weights() {
        assert!(matches!(AliasTable::new(&[0.0, 0.0]), Err(AliasError::NonPositiveSum)));
    }

    #[test]
    fn single_outcome_always_samples_itself() {
        let table = AliasTable::new(&[5.0]).unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(table.sample(&mut rng), 0);
        }
    }

    #[test]
    fn sampling_distribution_converges_to_weights() {
        let weights = [1.0, 2.0, 3.0, 4.0];
        let table = AliasTable::new(&weights).unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let mut counts = [0u32; 4];
        let draws = 200_000;
        for _ in 0..draws {
            counts[table.sample(&mut rng)] += 1;
        }
        let total: f64 = weights.iter().sum();
        for (i, &w) in weights.iter().enumerate() {
            let expected = draws as f64 * w / total;
            let observed = counts[i] as f64;
            assert!(
                (observed - expected).abs() / expected < 0.05,
                "outcome {i}: expected ~{expected}, got {observed}"
            );
        }
    }

    #[test]
    fn central_wrapper_remaps_to_node_indices() {
        let mut cat = CtlAliasTable::new(&[1.0, 1.0])
            .unwrap()
            .with_idxs(vec![10, 20])
            .unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        for _ in 0..10 {
            let node = cat.sample(&mut rng).unwrap();
            assert!(node == 10 || node == 20);
        }
    }

    #[test]
    fn central_wrapper_exhausts_after_max_samples() {
        let mut cat = CtlAliasTable::new(&[1.0, 1.0])
            .unwrap()
            .with_max_samples(2)
            .unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        assert!(cat.sample(&mut rng).is_ok());
        assert!(cat.sample(&mut rng).is_ok());
        assert!(!cat.samples_left());
        assert_eq!(cat.sample(&mut rng), Err(AliasError::Exhausted));
    }
}
