//! Dense row-major feature matrix shared by the normalizer and the classifier.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MatrixError {
    #[error("data length {len} does not match {n_rows} rows x {n_cols} columns")]
    ShapeMismatch {
        len: usize,
        n_rows: usize,
        n_cols: usize,
    },
}

/// Row-major `f64` matrix. Row `i` occupies `data[i * n_cols..(i + 1) * n_cols]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    n_rows: usize,
    n_cols: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    pub fn new(n_rows: usize, n_cols: usize, data: Vec<f64>) -> Result<Self, MatrixError> {
        if data.len() != n_rows * n_cols {
            return Err(MatrixError::ShapeMismatch {
                len: data.len(),
                n_rows,
                n_cols,
            });
        }
        Ok(Self {
            n_rows,
            n_cols,
            data,
        })
    }

    /// An empty matrix that still remembers its column count.
    pub fn empty(n_cols: usize) -> Self {
        Self {
            n_rows: 0,
            n_cols,
            data: Vec::new(),
        }
    }

    pub fn from_rows(rows: &[Vec<f64>], n_cols: usize) -> Result<Self, MatrixError> {
        let mut data = Vec::with_capacity(rows.len() * n_cols);
        for row in rows {
            if row.len() != n_cols {
                return Err(MatrixError::ShapeMismatch {
                    len: row.len(),
                    n_rows: 1,
                    n_cols,
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            n_rows: rows.len(),
            n_cols,
            data,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n_cols + col]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact(0) panics, and a zero-column matrix has no meaningful rows anyway
        self.data.chunks_exact(self.n_cols.max(1)).take(self.n_rows)
    }

    /// Copy the listed rows, in order, into a new matrix.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let mut data = Vec::with_capacity(indices.len() * self.n_cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Self {
            n_rows: indices.len(),
            n_cols: self.n_cols,
            data,
        }
    }

    /// Copy of column `col` as a vector.
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.n_rows).map(|r| self.get(r, col)).collect()
    }
}
