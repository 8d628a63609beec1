//! Gaussian-process surrogate over the unit-cube encoding of the search space.
//!
//! Matérn-5/2 kernel with unit amplitude on standardized objectives and a
//! small observation noise. On every refit the length scale is picked from a
//! fixed grid by maximising the log marginal likelihood.

use log::debug;
use thiserror::Error;

use crate::space::DIMS;

const LENGTH_SCALES: [f64; 9] = [0.05, 0.1, 0.2, 0.3, 0.5, 0.75, 1.0, 1.5, 2.0];
const NOISE: f64 = 1e-6;
const LOG_2PI: f64 = 1.837_877_066_409_345_3;

#[derive(Debug, Error, PartialEq)]
pub enum SurrogateError {
    #[error("surrogate needs at least one observation")]
    NoObservations,
    #[error("{points} points but {values} objective values")]
    LengthMismatch { points: usize, values: usize },
    #[error("non-finite objective value {0}")]
    NonFinite(f64),
    #[error("covariance is not positive definite even after jitter")]
    NotPositiveDefinite,
}

fn matern52(a: &[f64; DIMS], b: &[f64; DIMS], length_scale: f64) -> f64 {
    let r = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt();
    let z = 5.0_f64.sqrt() * r / length_scale;
    (1.0 + z + z * z / 3.0) * (-z).exp()
}

/// Lower Cholesky factor, row-major, written over `matrix`.
fn cholesky_in_place(matrix: &mut [f64], n: usize) -> Result<(), SurrogateError> {
    for i in 0..n {
        for j in 0..=i {
            let mut sum = matrix[i * n + j];
            for k in 0..j {
                sum -= matrix[i * n + k] * matrix[j * n + k];
            }
            if i == j {
                if !sum.is_finite() || sum <= 0.0 {
                    return Err(SurrogateError::NotPositiveDefinite);
                }
                matrix[i * n + i] = sum.sqrt();
            } else {
                matrix[i * n + j] = sum / matrix[j * n + j];
            }
        }
        for j in i + 1..n {
            matrix[i * n + j] = 0.0;
        }
    }
    Ok(())
}

/// Solve `L z = b` for lower-triangular `L`.
fn forward_solve(l: &[f64], n: usize, b: &[f64]) -> Vec<f64> {
    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i * n + k] * z[k];
        }
        z[i] = sum / l[i * n + i];
    }
    z
}

/// Solve `L^T x = z`.
fn backward_solve(l: &[f64], n: usize, z: &[f64]) -> Vec<f64> {
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in i + 1..n {
            sum -= l[k * n + i] * x[k];
        }
        x[i] = sum / l[i * n + i];
    }
    x
}

struct Factor {
    chol: Vec<f64>,
    alpha: Vec<f64>,
    log_likelihood: f64,
}

fn factorize(
    points: &[[f64; DIMS]],
    y: &[f64],
    length_scale: f64,
) -> Result<Factor, SurrogateError> {
    let n = points.len();
    let mut base = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut k = matern52(&points[i], &points[j], length_scale);
            if i == j {
                k += NOISE;
            }
            base[i * n + j] = k;
            base[j * n + i] = k;
        }
    }

    let mut jitter = 0.0;
    for _attempt in 0..6 {
        let mut cov = base.clone();
        for i in 0..n {
            cov[i * n + i] += jitter;
        }
        if cholesky_in_place(&mut cov, n).is_ok() {
            let z = forward_solve(&cov, n, y);
            let alpha = backward_solve(&cov, n, &z);
            let quad: f64 = y.iter().zip(&alpha).map(|(a, b)| a * b).sum();
            let log_det: f64 = 2.0 * (0..n).map(|i| cov[i * n + i].ln()).sum::<f64>();
            let log_likelihood = -0.5 * (quad + log_det + n as f64 * LOG_2PI);
            if log_likelihood.is_finite() {
                return Ok(Factor {
                    chol: cov,
                    alpha,
                    log_likelihood,
                });
            }
        }
        jitter = if jitter == 0.0 { 1e-8 } else { jitter * 100.0 };
    }
    Err(SurrogateError::NotPositiveDefinite)
}

#[derive(Debug, Clone)]
pub struct GaussianProcess {
    points: Vec<[f64; DIMS]>,
    chol: Vec<f64>,
    alpha: Vec<f64>,
    length_scale: f64,
    y_mean: f64,
    y_scale: f64,
}

impl GaussianProcess {
    pub fn fit(points: &[[f64; DIMS]], values: &[f64]) -> Result<Self, SurrogateError> {
        if points.is_empty() {
            return Err(SurrogateError::NoObservations);
        }
        if points.len() != values.len() {
            return Err(SurrogateError::LengthMismatch {
                points: points.len(),
                values: values.len(),
            });
        }
        if let Some(&bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(SurrogateError::NonFinite(bad));
        }

        let n = values.len() as f64;
        let y_mean = values.iter().sum::<f64>() / n;
        let sd = (values.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / n).sqrt();
        let y_scale = if sd > 1e-12 { sd } else { 1.0 };
        let y: Vec<f64> = values.iter().map(|v| (v - y_mean) / y_scale).collect();

        let mut best: Option<(f64, Factor)> = None;
        for &length_scale in &LENGTH_SCALES {
            let Ok(factor) = factorize(points, &y, length_scale) else {
                continue;
            };
            if best
                .as_ref()
                .map_or(true, |(_, b)| factor.log_likelihood > b.log_likelihood)
            {
                best = Some((length_scale, factor));
            }
        }
        let (length_scale, factor) = best.ok_or(SurrogateError::NotPositiveDefinite)?;
        debug!(
            "surrogate refit on {} points: length_scale={} log_likelihood={:.4}",
            points.len(),
            length_scale,
            factor.log_likelihood
        );

        Ok(Self {
            points: points.to_vec(),
            chol: factor.chol,
            alpha: factor.alpha,
            length_scale,
            y_mean,
            y_scale,
        })
    }

    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    /// Posterior mean and standard deviation in objective units.
    pub fn predict(&self, x: &[f64; DIMS]) -> (f64, f64) {
        let n = self.points.len();
        let k: Vec<f64> = self
            .points
            .iter()
            .map(|p| matern52(p, x, self.length_scale))
            .collect();
        let mean: f64 = k.iter().zip(&self.alpha).map(|(a, b)| a * b).sum();
        let v = forward_solve(&self.chol, n, &k);
        let var = (1.0 - v.iter().map(|x| x * x).sum::<f64>()).max(1e-12);
        (
            mean * self.y_scale + self.y_mean,
            var.sqrt() * self.y_scale,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(v: f64) -> [f64; DIMS] {
        [v, 0.5, 0.5, 0.5]
    }

    #[test]
    fn interpolates_observations() {
        let points = [pt(0.0), pt(0.5), pt(1.0)];
        let values = [-1.0, -1.5, -0.5];
        let gp = GaussianProcess::fit(&points, &values).unwrap();
        for (p, v) in points.iter().zip(values) {
            let (mean, sd) = gp.predict(p);
            assert!((mean - v).abs() < 1e-2, "mean {mean} vs {v}");
            assert!(sd < 0.05);
        }
    }

    #[test]
    fn uncertainty_grows_away_from_data() {
        let gp = GaussianProcess::fit(&[pt(0.0), pt(0.1)], &[-1.0, -1.2]).unwrap();
        let (_, near) = gp.predict(&pt(0.05));
        let (_, far) = gp.predict(&[1.0, 1.0, 1.0, 1.0]);
        assert!(far > near);
    }

    #[test]
    fn constant_objective_is_handled() {
        let gp = GaussianProcess::fit(&[pt(0.2), pt(0.8)], &[0.0, 0.0]).unwrap();
        let (mean, sd) = gp.predict(&pt(0.5));
        assert!(mean.abs() < 1e-9);
        assert!(sd.is_finite());
    }

    #[test]
    fn duplicate_points_survive_with_jitter() {
        let gp = GaussianProcess::fit(&[pt(0.3), pt(0.3)], &[-1.0, -1.0]).unwrap();
        assert!(gp.predict(&pt(0.3)).0.is_finite());
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            GaussianProcess::fit(&[], &[]).unwrap_err(),
            SurrogateError::NoObservations
        );
        assert_eq!(
            GaussianProcess::fit(&[pt(0.0)], &[1.0, 2.0]).unwrap_err(),
            SurrogateError::LengthMismatch { points: 1, values: 2 }
        );
        assert!(matches!(
            GaussianProcess::fit(&[pt(0.0)], &[f64::NAN]),
            Err(SurrogateError::NonFinite(_))
        ));
    }

    #[test]
    fn cholesky_of_diagonal() {
        let mut m = vec![4.0, 0.0, 0.0, 9.0];
        cholesky_in_place(&mut m, 2).unwrap();
        assert_eq!(m, vec![2.0, 0.0, 0.0, 3.0]);
    }
}
