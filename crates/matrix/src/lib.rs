//! Dense matrix kernel used by the FPCA agent and aggregator: thin SVD,
//! column concatenation, weighted subspace merge, and rank adjustment.
//!
//! All operations work over `nalgebra::DMatrix<f64>` and a singular-value
//! vector kept separate from the matrix type (the source's `DiagDense`
//! played the same role). `U` always has orthonormal columns and the
//! singular values are kept in non-increasing order.

use nalgebra::DMatrix;
use thiserror::Error;

/// Errors raised by the matrix kernel. Each corresponds to a precondition
/// check the source panicked on; here they are recoverable `Result`s so a
/// bad batch can be discarded without taking the agent down.
#[derive(Error, Debug, PartialEq)]
pub enum MatrixError {
    /// `svd_r` was asked for a rank larger than `min(rows, cols)`.
    #[error("rank r must be smaller than the dimensions of the input matrix")]
    RankTooLarge,
    /// `concat_cols` was given matrices with a different row count.
    #[error("input matrices must have the same number of rows")]
    RowMismatch,
    /// `rank_adjust` was given an `r` outside `[1, sigma.len()]`.
    #[error("rank is out of bounds")]
    RankOutOfBounds,
    /// The first `r` singular values summed to zero and the r-th is
    /// nonzero; the impact ratio is undefined.
    #[error("division by zero: sum of first {0} diagonal elements is zero")]
    DivisionByZero(usize),
    /// `rank_adjust` requires a rank-(r+1) buffer: `U` and `sigma` must
    /// carry strictly more than `r` columns/entries so the grow branch has
    /// a real orthonormal column and singular value to promote.
    #[error("r must be smaller than the number of columns in U")]
    RankNotSmallerThanColumns,
}

/// Result type for the matrix kernel.
pub type MatrixResult<T> = Result<T, MatrixError>;

/// Thin SVD of `b`, truncated to rank `r`. Returns `(U_r, sigma_r)` with
/// `U_r` of shape `rows x r`, orthonormal columns, and `sigma_r` the `r`
/// largest singular values in non-increasing order.
pub fn svd_r(b: &DMatrix<f64>, r: usize) -> MatrixResult<(DMatrix<f64>, Vec<f64>)> {
    let (rows, cols) = (b.nrows(), b.ncols());
    if rows.min(cols) < r {
        return Err(MatrixError::RankTooLarge);
    }

    let svd = nalgebra::linalg::SVD::new(b.clone(), true, false);
    let u_full = svd.u.expect("SVD computed with compute_u = true");
    let mut singular: Vec<(usize, f64)> =
        svd.singular_values.iter().copied().enumerate().collect();
    singular.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut u_r = DMatrix::zeros(u_full.nrows(), r);
    let mut sigma_r = Vec::with_capacity(r);
    for (dest, (src_idx, value)) in singular.into_iter().take(r).enumerate() {
        u_r.column_mut(dest).copy_from(&u_full.column(src_idx));
        sigma_r.push(value);
    }
    Ok((u_r, sigma_r))
}

/// Concatenate `a` and `b` column-wise; both must share a row count.
pub fn concat_cols(a: &DMatrix<f64>, b: &DMatrix<f64>) -> MatrixResult<DMatrix<f64>> {
    if a.nrows() != b.nrows() {
        return Err(MatrixError::RowMismatch);
    }
    let mut out = DMatrix::zeros(a.nrows(), a.ncols() + b.ncols());
    out.view_mut((0, 0), (a.nrows(), a.ncols())).copy_from(a);
    out.view_mut((0, a.ncols()), (b.nrows(), b.ncols()))
        .copy_from(b);
    Ok(out)
}

/// Scale each column `i` of `u` by `sigma[i]`, i.e. compute `U * diag(sigma)`.
fn scale_columns(u: &DMatrix<f64>, sigma: &[f64]) -> DMatrix<f64> {
    let mut out = u.clone();
    for (i, s) in sigma.iter().enumerate() {
        out.column_mut(i).scale_mut(*s);
    }
    out
}

/// Public form of [`scale_columns`]: the `U*Sigma` product submitted to the
/// aggregator and used to recompute the sum-projection vector `p`.
pub fn u_sigma(u: &DMatrix<f64>, sigma: &[f64]) -> DMatrix<f64> {
    scale_columns(u, sigma)
}

/// Estimate a singular-value vector for `u_a` against a fresh batch `b`,
/// used when an FPCA cycle receives a new aggregate basis `U_A` from the
/// aggregator and needs a matching `Sigma_A` to merge it in: row `i` of
/// `U_A^T * B` is the batch's activity along aggregate direction `i`, and
/// its Euclidean norm stands in for that direction's singular value.
pub fn sigma_from_projection(u_a: &DMatrix<f64>, b: &DMatrix<f64>) -> MatrixResult<Vec<f64>> {
    if u_a.nrows() != b.nrows() {
        return Err(MatrixError::RowMismatch);
    }
    let projection = u_a.transpose() * b;
    Ok((0..projection.nrows())
        .map(|i| projection.row(i).norm())
        .collect())
}

/// Sum-projection vector `p_i = sum_j |U*Sigma|_ij / tr(Sigma)`, read
/// lock-free by the signal calculator. Returns all zeros if `tr(Sigma)` is
/// zero (no direction carries any mass yet).
pub fn sum_projection(u: &DMatrix<f64>, sigma: &[f64]) -> Vec<f64> {
    let trace: f64 = sigma.iter().sum();
    let us = scale_columns(u, sigma);
    (0..us.nrows())
        .map(|i| {
            if trace == 0.0 {
                0.0
            } else {
                us.row(i).iter().map(|v| v.abs()).sum::<f64>() / trace
            }
        })
        .collect()
}

/// Weighted incremental subspace merge. Computes
/// `S = [w_old * U1 * Sigma1 | w_new * U2 * Sigma2] / (w_old + w_new)`
/// then `svd_r(S, r)`. `w_old` (forget) weights the existing subspace,
/// `w_new` (enhance) weights the incoming batch.
pub fn merge(
    u1: &DMatrix<f64>,
    sigma1: &[f64],
    u2: &DMatrix<f64>,
    sigma2: &[f64],
    r: usize,
    forget: f64,
    enhance: f64,
) -> MatrixResult<(DMatrix<f64>, Vec<f64>)> {
    let total = forget + enhance;
    let temp1 = scale_columns(u1, sigma1) * (forget / total);
    let temp2 = scale_columns(u2, sigma2) * (enhance / total);
    let concat = concat_cols(&temp1, &temp2)?;
    svd_r(&concat, r)
}

/// Aggregator-side merge of two already-weighted `U*Sigma` products
/// (as received over the wire from two agents), averaged and re-factored.
pub fn agg_merge(
    u_sigma1: &DMatrix<f64>,
    u_sigma2: &DMatrix<f64>,
    r: usize,
) -> MatrixResult<(DMatrix<f64>, Vec<f64>)> {
    let concat = concat_cols(u_sigma1, u_sigma2)? * 0.5;
    svd_r(&concat, r)
}

/// Fraction of the first-`r` singular-value mass carried by the r-th
/// value itself: `sigma[r-1] / sum(sigma[0..r])`.
pub fn impact_of_rank(sigma: &[f64], r: usize) -> MatrixResult<f64> {
    if r < 1 || sigma.len() < r {
        return Err(MatrixError::RankOutOfBounds);
    }
    let total: f64 = sigma[..r].iter().sum();
    if total == 0.0 {
        if sigma[r - 1] == 0.0 {
            return Ok(0.0);
        }
        return Err(MatrixError::DivisionByZero(r));
    }
    Ok(sigma[r - 1] / total)
}

/// Adjust the working rank based on how much variance the r-th component
/// still carries. `u` and `sigma` must be a rank-(r+1) buffer (strictly
/// more than `r` columns/entries) so the grow branch has a real
/// orthonormal column and singular value ready to promote — both already
/// came out of the same `svd_r` factorization, so growing never breaks
/// orthonormality.
///
/// - impact < alpha: shrink to r-1 (the r-th component is negligible).
/// - alpha <= impact <= beta: keep r.
/// - impact > beta: grow to r+1 (the buffer's (r+1)-th column/value).
pub fn rank_adjust(
    u: &DMatrix<f64>,
    sigma: &[f64],
    r: usize,
    alpha: f64,
    beta: f64,
) -> MatrixResult<(DMatrix<f64>, Vec<f64>)> {
    let uc = u.ncols();
    let sc = sigma.len();
    if uc <= r || sc <= r {
        return Err(MatrixError::RankNotSmallerThanColumns);
    }

    let impact = impact_of_rank(sigma, r)?;
    let rank = if impact < alpha {
        r - 1
    } else if impact <= beta {
        r
    } else {
        r + 1
    };

    let out_u = u.columns(0, rank).into_owned();
    let out_sigma = sigma[..rank].to_vec();
    Ok((out_u, out_sigma))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_batch(n: usize) -> DMatrix<f64> {
        DMatrix::identity(n, n)
    }

    #[test]
    fn svd_r_returns_orthonormal_columns_in_non_increasing_order() {
        let b = DMatrix::from_row_slice(3, 3, &[3.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0]);
        let (u, sigma) = svd_r(&b, 2).unwrap();
        assert_eq!(u.ncols(), 2);
        assert!(sigma[0] >= sigma[1]);
        let gram = u.transpose() * &u;
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((gram[(i, j)] - expected).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn svd_r_rejects_rank_larger_than_dimensions() {
        let b = identity_batch(2);
        assert_eq!(svd_r(&b, 3), Err(MatrixError::RankTooLarge));
    }

    #[test]
    fn concat_cols_rejects_row_mismatch() {
        let a = DMatrix::zeros(2, 2);
        let b = DMatrix::zeros(3, 2);
        assert_eq!(concat_cols(&a, &b), Err(MatrixError::RowMismatch));
    }

    #[test]
    fn concat_cols_preserves_values_exactly() {
        let a = DMatrix::from_row_slice(2, 1, &[1.0, 2.0]);
        let b = DMatrix::from_row_slice(2, 1, &[3.0, 4.0]);
        let c = concat_cols(&a, &b).unwrap();
        assert_eq!(c, DMatrix::from_row_slice(2, 2, &[1.0, 3.0, 2.0, 4.0]));
    }

    #[test]
    fn merge_of_two_drifted_rank_two_subspaces_recovers_singular_values() {
        let base = DMatrix::from_row_slice(
            4,
            2,
            &[5.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 0.0],
        );
        let (u1, s1) = svd_r(&base, 2).unwrap();
        let drifted = DMatrix::from_row_slice(
            4,
            2,
            &[4.8, 0.2, 0.1, 2.9, 0.0, 0.1, 0.1, 0.0],
        );
        let (u2, s2) = svd_r(&drifted, 2).unwrap();

        let (_, sigma) = merge(&u1, &s1, &u2, &s2, 2, 0.9, 1.1).unwrap();
        assert!((sigma[0] - 5.0).abs() / 5.0 < 0.1);
        assert!((sigma[1] - 3.0).abs() / 3.0 < 0.1);
    }

    #[test]
    fn rank_adjust_shrinks_when_impact_below_alpha() {
        let u = DMatrix::identity(4, 3);
        let sigma = vec![10.0, 9.0, 0.01];
        let (out_u, out_sigma) = rank_adjust(&u, &sigma, 2, 0.05, 0.5).unwrap();
        assert_eq!(out_sigma.len(), 1);
        assert_eq!(out_u.ncols(), 1);
    }

    #[test]
    fn rank_adjust_grows_when_impact_above_beta_using_the_buffer_column() {
        let u = DMatrix::identity(4, 3);
        let sigma = vec![10.0, 9.0, 8.0];
        let (out_u, out_sigma) = rank_adjust(&u, &sigma, 2, 0.05, 0.3).unwrap();
        assert_eq!(out_sigma.len(), 3);
        assert_eq!(out_u.ncols(), 3);
    }

    #[test]
    fn rank_adjust_requires_a_buffer_column_beyond_r() {
        let u = DMatrix::identity(4, 2);
        let sigma = vec![10.0, 9.0];
        assert_eq!(
            rank_adjust(&u, &sigma, 2, 0.05, 0.5),
            Err(MatrixError::RankNotSmallerThanColumns)
        );
    }

    #[test]
    fn impact_of_rank_reports_zero_when_all_components_vanish() {
        let sigma = vec![0.0, 0.0, 0.0];
        assert_eq!(impact_of_rank(&sigma, 3), Ok(0.0));
    }

    #[test]
    fn sum_projection_sums_to_at_most_one() {
        let u = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        let sigma = vec![2.0, 1.0];
        let p = sum_projection(&u, &sigma);
        assert_eq!(p.len(), 3);
        assert!(p.iter().all(|&v| v >= 0.0));
        let row_sum: f64 = u
            .row_iter()
            .enumerate()
            .map(|(i, _)| p[i])
            .sum();
        assert!(row_sum <= 1.0 + 1e-9);
    }

    #[test]
    fn sum_projection_is_zero_when_trace_is_zero() {
        let u = DMatrix::identity(2, 2);
        let p = sum_projection(&u, &[0.0, 0.0]);
        assert_eq!(p, vec![0.0, 0.0]);
    }

    #[test]
    fn sigma_from_projection_rejects_row_mismatch() {
        let u_a = DMatrix::zeros(3, 2);
        let b = DMatrix::zeros(4, 5);
        assert_eq!(sigma_from_projection(&u_a, &b), Err(MatrixError::RowMismatch));
    }

    #[test]
    fn sigma_from_projection_matches_manual_row_norms() {
        let u_a = DMatrix::identity(2, 2);
        let b = DMatrix::from_row_slice(2, 2, &[3.0, 4.0, 0.0, 0.0]);
        let sigma = sigma_from_projection(&u_a, &b).unwrap();
        assert!((sigma[0] - 5.0).abs() < 1e-9);
        assert!((sigma[1] - 0.0).abs() < 1e-9);
    }
}
