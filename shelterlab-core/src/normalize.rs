//! Per-feature standardization fitted on training rows only.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matrix::{FeatureMatrix, MatrixError};

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("cannot fit a scaler on an empty matrix")]
    EmptyInput,
    #[error("scaler was fitted on {fitted} columns, matrix has {actual}")]
    ColumnMismatch { fitted: usize, actual: usize },
    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

/// Fitted standardization state: `(x - mean) / scale` per column.
///
/// Scale is the population standard deviation; a constant column gets scale 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(train: &FeatureMatrix) -> Result<Self, NormalizeError> {
        if train.is_empty() {
            return Err(NormalizeError::EmptyInput);
        }
        let n = train.n_rows() as f64;
        let cols = train.n_cols();

        let mut means = vec![0.0; cols];
        for row in train.rows() {
            for (m, &x) in means.iter_mut().zip(row) {
                *m += x;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut scales = vec![0.0; cols];
        for row in train.rows() {
            for ((s, &x), &m) in scales.iter_mut().zip(row).zip(&means) {
                *s += (x - m) * (x - m);
            }
        }
        for s in &mut scales {
            let sd = (*s / n).sqrt();
            *s = if sd > f64::EPSILON { sd } else { 1.0 };
        }

        Ok(Self { means, scales })
    }

    pub fn transform(&self, matrix: &FeatureMatrix) -> Result<FeatureMatrix, NormalizeError> {
        if matrix.n_cols() != self.means.len() {
            return Err(NormalizeError::ColumnMismatch {
                fitted: self.means.len(),
                actual: matrix.n_cols(),
            });
        }
        let data: Vec<f64> = matrix
            .rows()
            .flat_map(|row| {
                row.iter()
                    .zip(&self.means)
                    .zip(&self.scales)
                    .map(|((&x, &m), &s)| (x - m) / s)
            })
            .collect();
        Ok(FeatureMatrix::new(matrix.n_rows(), matrix.n_cols(), data)?)
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }
}
