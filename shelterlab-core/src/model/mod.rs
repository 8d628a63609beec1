//! Trainable binary classifier.
//!
//! The search engine only sees the two traits below. `Trainer` fits a model
//! from normalized features, labels and a configuration; the resulting
//! `Classifier` answers probability and hard-label queries. Everything
//! concrete lives behind these seams so a different learner can be plugged in
//! without touching the search or calibration code.

mod boosted;
mod tree;

pub use boosted::{BoostedTrees, BoostedTreesTrainer};
pub use tree::RegressionTree;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::matrix::FeatureMatrix;
use crate::params::HyperParams;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("cannot train on an empty matrix")]
    EmptyTrainingSet,
    #[error("{rows} feature rows but {labels} labels")]
    LabelMismatch { rows: usize, labels: usize },
    #[error("labels must be 0 or 1, found {0}")]
    NonBinaryLabel(u8),
    #[error("invalid hyperparameter: {0}")]
    InvalidParams(String),
    #[error("model expects {expected} features, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },
}

/// A fitted binary classifier.
pub trait Classifier: Send + Sync {
    /// Number of feature columns the model was fitted on.
    fn n_features(&self) -> usize;

    /// Positive-class probability per row.
    fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError>;

    /// Hard labels at the default cutoff: `1` iff probability > 0.5.
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<u8>, ModelError> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| u8::from(p > 0.5))
            .collect())
    }
}

/// Fits a `Classifier`. Identical inputs must yield an identical model.
pub trait Trainer: Send + Sync {
    type Model: Classifier + Serialize + DeserializeOwned + Clone;

    fn name(&self) -> &str;

    fn train(
        &self,
        x: &FeatureMatrix,
        y: &[u8],
        params: &HyperParams,
    ) -> Result<Self::Model, ModelError>;
}

/// Shared input checks for trainers.
pub(crate) fn validate_training_input(
    x: &FeatureMatrix,
    y: &[u8],
    params: &HyperParams,
) -> Result<(), ModelError> {
    if x.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if x.n_rows() != y.len() {
        return Err(ModelError::LabelMismatch {
            rows: x.n_rows(),
            labels: y.len(),
        });
    }
    if let Some(&bad) = y.iter().find(|&&v| v > 1) {
        return Err(ModelError::NonBinaryLabel(bad));
    }
    if params.n_estimators == 0 {
        return Err(ModelError::InvalidParams("n_estimators must be > 0".into()));
    }
    if !(params.learning_rate.is_finite() && params.learning_rate > 0.0) {
        return Err(ModelError::InvalidParams(format!(
            "learning_rate must be positive, got {}",
            params.learning_rate
        )));
    }
    Ok(())
}
