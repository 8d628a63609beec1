//! Bounded hyperparameter search space.
//!
//! Four dimensions: lag depth, tree depth, ensemble size (integers) and
//! learning rate (real). The surrogate works on the unit cube; `encode` maps
//! a configuration into it and `decode` maps back, rounding integer dimensions
//! to the nearest integer.

use rand::Rng;
use serde::{Deserialize, Serialize};
use shelterlab_core::HyperParams;
use thiserror::Error;

/// Number of search dimensions.
pub const DIMS: usize = 4;

#[derive(Debug, Error, PartialEq)]
pub enum SpaceError {
    #[error("dimension '{dimension}' has empty range [{lo}, {hi}]")]
    InvalidRange {
        dimension: &'static str,
        lo: f64,
        hi: f64,
    },
    #[error("configuration outside search bounds: {0}")]
    BoundsViolation(String),
}

/// Inclusive bounds for every dimension. Serialized as `[lo, hi]` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpace {
    pub lags: (usize, usize),
    pub max_depth: (usize, usize),
    pub n_estimators: (usize, usize),
    pub learning_rate: (f64, f64),
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            lags: (0, 3),
            max_depth: (6, 9),
            n_estimators: (180, 220),
            learning_rate: (0.0005, 0.0015),
        }
    }
}

fn unit(value: f64, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn decode_int(u: f64, (lo, hi): (usize, usize)) -> usize {
    let v = lo as f64 + u.clamp(0.0, 1.0) * (hi - lo) as f64;
    (v.round() as usize).clamp(lo, hi)
}

impl SearchSpace {
    pub fn validate(&self) -> Result<(), SpaceError> {
        // (name, range, smallest allowed value)
        let int_dims = [
            ("lags", self.lags, 0),
            ("max_depth", self.max_depth, 1),
            ("n_estimators", self.n_estimators, 1),
        ];
        for (dimension, (lo, hi), min) in int_dims {
            if lo > hi || lo < min {
                return Err(SpaceError::InvalidRange {
                    dimension,
                    lo: lo as f64,
                    hi: hi as f64,
                });
            }
        }
        let (lo, hi) = self.learning_rate;
        if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo <= hi) {
            return Err(SpaceError::InvalidRange {
                dimension: "learning_rate",
                lo,
                hi,
            });
        }
        Ok(())
    }

    pub fn contains(&self, params: &HyperParams) -> bool {
        let within = |v: usize, (lo, hi): (usize, usize)| lo <= v && v <= hi;
        within(params.lags, self.lags)
            && within(params.max_depth, self.max_depth)
            && within(params.n_estimators, self.n_estimators)
            && self.learning_rate.0 <= params.learning_rate
            && params.learning_rate <= self.learning_rate.1
    }

    /// Reject a configuration outside the bounds.
    pub fn check(&self, params: &HyperParams) -> Result<(), SpaceError> {
        if self.contains(params) {
            Ok(())
        } else {
            Err(SpaceError::BoundsViolation(params.to_string()))
        }
    }

    /// Draw a configuration uniformly: integers over their inclusive range,
    /// the learning rate over its interval.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> HyperParams {
        let (lr_lo, lr_hi) = self.learning_rate;
        HyperParams {
            lags: rng.gen_range(self.lags.0..=self.lags.1),
            max_depth: rng.gen_range(self.max_depth.0..=self.max_depth.1),
            n_estimators: rng.gen_range(self.n_estimators.0..=self.n_estimators.1),
            learning_rate: if lr_hi > lr_lo {
                rng.gen_range(lr_lo..=lr_hi)
            } else {
                lr_lo
            },
        }
    }

    pub fn encode(&self, params: &HyperParams) -> [f64; DIMS] {
        [
            unit(params.lags as f64, self.lags.0 as f64, self.lags.1 as f64),
            unit(
                params.max_depth as f64,
                self.max_depth.0 as f64,
                self.max_depth.1 as f64,
            ),
            unit(
                params.n_estimators as f64,
                self.n_estimators.0 as f64,
                self.n_estimators.1 as f64,
            ),
            unit(
                params.learning_rate,
                self.learning_rate.0,
                self.learning_rate.1,
            ),
        ]
    }

    pub fn decode(&self, u: &[f64; DIMS]) -> HyperParams {
        let (lr_lo, lr_hi) = self.learning_rate;
        HyperParams {
            lags: decode_int(u[0], self.lags),
            max_depth: decode_int(u[1], self.max_depth),
            n_estimators: decode_int(u[2], self.n_estimators),
            learning_rate: (lr_lo + u[3].clamp(0.0, 1.0) * (lr_hi - lr_lo)).clamp(lr_lo, lr_hi),
        }
    }

    /// Number of distinct configurations, or `None` when the learning rate
    /// is continuous.
    pub fn cardinality(&self) -> Option<usize> {
        if self.learning_rate.0 < self.learning_rate.1 {
            return None;
        }
        let span = |(lo, hi): (usize, usize)| hi - lo + 1;
        Some(span(self.lags) * span(self.max_depth) * span(self.n_estimators))
    }

    /// Every configuration in lexicographic order, or `None` when the
    /// learning rate is continuous.
    pub fn configurations(&self) -> Option<impl Iterator<Item = HyperParams> + '_> {
        self.cardinality()?;
        let learning_rate = self.learning_rate.0;
        Some((self.lags.0..=self.lags.1).flat_map(move |lags| {
            (self.max_depth.0..=self.max_depth.1).flat_map(move |max_depth| {
                (self.n_estimators.0..=self.n_estimators.1).map(move |n_estimators| HyperParams {
                    lags,
                    max_depth,
                    n_estimators,
                    learning_rate,
                })
            })
        }))
    }
}
