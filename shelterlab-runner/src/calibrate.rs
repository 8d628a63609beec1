//! Subgroup threshold calibration.
//!
//! For every subgroup of every dimension, sweep the subgroup's own
//! probabilities as cutoffs and keep the one maximising F-beta. The chosen
//! cutoff replaces the default 0.5 decision for that subgroup's rows only.
//! Each dimension is calibrated on its own copy of the default decisions.

use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use shelterlab_core::metrics::{apply_threshold, best_fbeta_point, fbeta_score};
use shelterlab_core::{
    precision_recall_curve, Classifier, FeatureMatrix, LaggedFrame, ModelError, NormalizeError,
    StandardScaler,
};
use thiserror::Error;

/// Cutoff applied by `Classifier::predict`.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Error, PartialEq)]
pub enum CalibrationError {
    #[error("beta must be finite and positive, got {0}")]
    InvalidBeta(f64),
    #[error("{what} has {actual} rows, expected {expected}")]
    LengthMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },
    #[error("probability at row {row} is not finite ({value})")]
    NonFiniteProbability { row: usize, value: f64 },
    #[error("evaluation rows carry no subgroup column '{0}'")]
    MissingDimension(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// (dimension, subgroup) → cutoff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdMap {
    pub beta: f64,
    pub default_threshold: f64,
    pub thresholds: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ThresholdMap {
    pub fn get(&self, dimension: &str, subgroup: &str) -> Option<f64> {
        self.thresholds.get(dimension)?.get(subgroup).copied()
    }

    /// Calibrated cutoff, or the default for skipped or unknown subgroups.
    pub fn threshold_for(&self, dimension: &str, subgroup: &str) -> f64 {
        self.get(dimension, subgroup)
            .unwrap_or(self.default_threshold)
    }

    /// Decisions for one dimension given its row-aligned membership.
    pub fn decide(&self, dimension: &str, probabilities: &[f64], members: &[String]) -> Vec<u8> {
        probabilities
            .iter()
            .zip(members)
            .map(|(&p, m)| match self.get(dimension, m) {
                Some(t) => u8::from(p >= t),
                None => u8::from(p > self.default_threshold),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoPositives,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPositives => f.write_str("no positive examples"),
        }
    }
}

/// Before/after scores of one subgroup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgroupReport {
    pub dimension: String,
    pub subgroup: String,
    pub n_rows: usize,
    pub n_positive: usize,
    pub threshold: Option<f64>,
    pub skipped: Option<SkipReason>,
    pub f1_before: f64,
    pub f2_before: f64,
    pub f1_after: f64,
    pub f2_after: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionCalibration {
    pub dimension: String,
    pub decisions: Vec<u8>,
    pub subgroups: Vec<SubgroupReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub thresholds: ThresholdMap,
    pub default_decisions: Vec<u8>,
    pub dimensions: Vec<DimensionCalibration>,
}

impl Calibration {
    pub fn reports(&self) -> impl Iterator<Item = &SubgroupReport> {
        self.dimensions.iter().flat_map(|d| &d.subgroups)
    }

    pub fn dimension(&self, name: &str) -> Option<&DimensionCalibration> {
        self.dimensions.iter().find(|d| d.dimension == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubgroupCalibrator {
    beta: f64,
}

impl Default for SubgroupCalibrator {
    fn default() -> Self {
        Self { beta: 2.0 }
    }
}

impl SubgroupCalibrator {
    pub fn new(beta: f64) -> Result<Self, CalibrationError> {
        if !(beta.is_finite() && beta > 0.0) {
            return Err(CalibrationError::InvalidBeta(beta));
        }
        Ok(Self { beta })
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Best cutoff for one subgroup, or `None` when it has no positives.
    pub fn best_threshold(&self, labels: &[u8], probabilities: &[f64]) -> Option<f64> {
        let curve = precision_recall_curve(labels, probabilities)?;
        best_fbeta_point(&curve, self.beta).map(|(point, _)| point.threshold)
    }

    /// Calibrate precomputed probabilities.
    ///
    /// `memberships` pairs each dimension name with its row-aligned subgroup
    /// labels.
    pub fn calibrate(
        &self,
        probabilities: &[f64],
        labels: &[u8],
        memberships: &[(&str, &[String])],
    ) -> Result<Calibration, CalibrationError> {
        let n = probabilities.len();
        if labels.len() != n {
            return Err(CalibrationError::LengthMismatch {
                what: "labels".into(),
                expected: n,
                actual: labels.len(),
            });
        }
        if let Some((row, &value)) = probabilities
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite())
        {
            return Err(CalibrationError::NonFiniteProbability { row, value });
        }
        let default_decisions: Vec<u8> = probabilities
            .iter()
            .map(|&p| u8::from(p > DEFAULT_THRESHOLD))
            .collect();

        let mut thresholds = ThresholdMap {
            beta: self.beta,
            default_threshold: DEFAULT_THRESHOLD,
            thresholds: BTreeMap::new(),
        };
        let mut dimensions = Vec::with_capacity(memberships.len());

        for &(dimension, members) in memberships {
            if members.len() != n {
                return Err(CalibrationError::LengthMismatch {
                    what: format!("subgroup column '{dimension}'"),
                    expected: n,
                    actual: members.len(),
                });
            }
            let mut decisions = default_decisions.clone();
            let mut cutoffs = BTreeMap::new();
            let mut reports = Vec::new();

            let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
            for (i, m) in members.iter().enumerate() {
                groups.entry(m.as_str()).or_default().push(i);
            }

            for (subgroup, rows) in groups {
                let y: Vec<u8> = rows.iter().map(|&i| labels[i]).collect();
                let p: Vec<f64> = rows.iter().map(|&i| probabilities[i]).collect();
                let before: Vec<u8> = rows.iter().map(|&i| default_decisions[i]).collect();
                let n_positive = y.iter().filter(|&&v| v == 1).count();

                let mut report = SubgroupReport {
                    dimension: dimension.to_string(),
                    subgroup: subgroup.to_string(),
                    n_rows: rows.len(),
                    n_positive,
                    threshold: None,
                    skipped: None,
                    f1_before: fbeta_score(&y, &before, 1.0),
                    f2_before: fbeta_score(&y, &before, 2.0),
                    f1_after: 0.0,
                    f2_after: 0.0,
                };

                let after = match self.best_threshold(&y, &p) {
                    Some(t) => {
                        let after = apply_threshold(&p, t);
                        for (&row, &d) in rows.iter().zip(&after) {
                            decisions[row] = d;
                        }
                        cutoffs.insert(subgroup.to_string(), t);
                        report.threshold = Some(t);
                        after
                    }
                    None => {
                        warn!("{dimension}={subgroup}: no positive examples, keeping default cutoff");
                        report.skipped = Some(SkipReason::NoPositives);
                        before
                    }
                };
                report.f1_after = fbeta_score(&y, &after, 1.0);
                report.f2_after = fbeta_score(&y, &after, 2.0);
                info!(
                    "{dimension}={subgroup}: n={} F1 {:.4} -> {:.4}, F2 {:.4} -> {:.4}",
                    report.n_rows,
                    report.f1_before,
                    report.f1_after,
                    report.f2_before,
                    report.f2_after
                );
                reports.push(report);
            }

            thresholds.thresholds.insert(dimension.to_string(), cutoffs);
            dimensions.push(DimensionCalibration {
                dimension: dimension.to_string(),
                decisions,
                subgroups: reports,
            });
        }

        Ok(Calibration {
            thresholds,
            default_decisions,
            dimensions,
        })
    }

    /// Calibrate a fitted model on already-normalized features.
    pub fn calibrate_model<C: Classifier>(
        &self,
        model: &C,
        features: &FeatureMatrix,
        labels: &[u8],
        memberships: &[(&str, &[String])],
    ) -> Result<Calibration, CalibrationError> {
        let probabilities = model.predict_proba(features)?;
        self.calibrate(&probabilities, labels, memberships)
    }

    /// Calibrate on evaluation rows of a lagged frame.
    ///
    /// `dimensions` pairs a dimension name with the frame's subgroup column.
    pub fn calibrate_frame<C: Classifier>(
        &self,
        model: &C,
        normalizer: &StandardScaler,
        eval: &LaggedFrame,
        dimensions: &[(String, String)],
    ) -> Result<Calibration, CalibrationError> {
        let x = normalizer.transform(&eval.features)?;
        let memberships = dimensions
            .iter()
            .map(|(name, column)| {
                eval.subgroup(column)
                    .map(|m| (name.as_str(), m))
                    .ok_or_else(|| CalibrationError::MissingDimension(column.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.calibrate_model(model, &x, &eval.labels, &memberships)
    }
}
