//! Expected-improvement acquisition.
//!
//! With a continuous learning rate the maximum is taken over seeded random
//! candidates. A fully discrete space is small enough to scan, so every
//! unscored configuration is a candidate.

use std::collections::HashSet;

use rand::Rng;
use shelterlab_core::{HyperParams, ParamKey};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use thiserror::Error;

use crate::space::SearchSpace;
use crate::surrogate::GaussianProcess;

#[derive(Debug, Error, PartialEq)]
pub enum AcquisitionError {
    #[error("exploration margin must be finite and >= 0, got {0}")]
    InvalidXi(f64),
    #[error("normal distribution: {0}")]
    Distribution(String),
}

/// Expected improvement for a minimised objective.
#[derive(Debug, Clone)]
pub struct ExpectedImprovement {
    xi: f64,
    normal: Normal,
}

impl ExpectedImprovement {
    pub fn new(xi: f64) -> Result<Self, AcquisitionError> {
        if !(xi.is_finite() && xi >= 0.0) {
            return Err(AcquisitionError::InvalidXi(xi));
        }
        let normal =
            Normal::new(0.0, 1.0).map_err(|e| AcquisitionError::Distribution(e.to_string()))?;
        Ok(Self { xi, normal })
    }

    /// EI of a point with posterior `(mean, sd)` given the best value seen.
    pub fn value(&self, mean: f64, sd: f64, best: f64) -> f64 {
        let improvement = best - mean - self.xi;
        if sd <= 1e-12 {
            return improvement.max(0.0);
        }
        let z = improvement / sd;
        improvement * self.normal.cdf(z) + sd * self.normal.pdf(z)
    }

    /// Return the unscored candidate with the highest EI (first maximum in
    /// candidate order). Continuous spaces draw `n_candidates` samples;
    /// discrete spaces scan every configuration. `None` when no unscored
    /// candidate is left.
    pub fn propose<R: Rng + ?Sized>(
        &self,
        surrogate: &GaussianProcess,
        space: &SearchSpace,
        rng: &mut R,
        n_candidates: usize,
        best: f64,
        scored: &HashSet<ParamKey>,
    ) -> Option<HyperParams> {
        if let Some(all) = space.configurations() {
            return self.best_of(surrogate, space, best, all, scored);
        }
        let sampled = (0..n_candidates).map(|_| space.sample(rng));
        self.best_of(surrogate, space, best, sampled, scored)
    }

    fn best_of(
        &self,
        surrogate: &GaussianProcess,
        space: &SearchSpace,
        best: f64,
        candidates: impl Iterator<Item = HyperParams>,
        scored: &HashSet<ParamKey>,
    ) -> Option<HyperParams> {
        let mut seen: HashSet<ParamKey> = HashSet::new();
        let mut winner: Option<(HyperParams, f64)> = None;
        for candidate in candidates {
            let key = candidate.key();
            if scored.contains(&key) || !seen.insert(key) {
                continue;
            }
            let (mean, sd) = surrogate.predict(&space.encode(&candidate));
            let ei = self.value(mean, sd, best);
            if winner.map_or(true, |(_, w)| ei > w) {
                winner = Some((candidate, ei));
            }
        }
        winner.map(|(p, _)| p)
    }
}
