//! Generated protobuf/gRPC types for the three placement-engine services,
//! plus a small conversion layer to and from `nalgebra::DMatrix<f64>` so
//! callers never hand-unpack the row-major `data` field themselves.

tonic::include_proto!("pronto");

use nalgebra::DMatrix;

/// Errors converting between [`DenseMatrix`] and `nalgebra::DMatrix<f64>`.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum WireError {
    /// `rows * cols != data.len()`.
    #[error("dense matrix dimension mismatch: {rows}x{cols} but {len} entries")]
    DimensionMismatch { rows: i64, cols: i64, len: usize },
    /// A non-finite value (NaN or infinite) was found in `data`.
    #[error("dense matrix contains a non-finite value at index {0}")]
    NonFinite(usize),
    /// `rows` or `cols` was negative.
    #[error("dense matrix has a negative dimension: {rows}x{cols}")]
    NegativeDimension { rows: i64, cols: i64 },
}

impl DenseMatrix {
    /// Build a wire `DenseMatrix` from a dense column-major matrix,
    /// re-laying it out row-major for the wire.
    pub fn from_dmatrix(m: &DMatrix<f64>) -> Self {
        let rows = m.nrows();
        let cols = m.ncols();
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(m[(i, j)]);
            }
        }
        DenseMatrix {
            rows: rows as i64,
            cols: cols as i64,
            data,
        }
    }

    /// Validate and convert into a dense column-major matrix.
    pub fn into_dmatrix(self) -> Result<DMatrix<f64>, WireError> {
        if self.rows < 0 || self.cols < 0 {
            return Err(WireError::NegativeDimension {
                rows: self.rows,
                cols: self.cols,
            });
        }
        let (rows, cols) = (self.rows as usize, self.cols as usize);
        if self.data.len() != rows * cols {
            return Err(WireError::DimensionMismatch {
                rows: self.rows,
                cols: self.cols,
                len: self.data.len(),
            });
        }
        if let Some(idx) = self.data.iter().position(|v| !v.is_finite()) {
            return Err(WireError::NonFinite(idx));
        }
        Ok(DMatrix::from_row_slice(rows, cols, &self.data))
    }
}
