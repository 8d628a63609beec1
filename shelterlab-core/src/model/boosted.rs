//! Logistic-loss gradient boosting.

use log::debug;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use super::{validate_training_input, Classifier, ModelError, Trainer};
use crate::matrix::FeatureMatrix;
use crate::params::HyperParams;

/// Fits `BoostedTrees` with Newton leaf weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostedTreesTrainer {
    /// L2 penalty on leaf weights.
    pub lambda: f64,
    /// Minimum hessian sum per child.
    pub min_child_weight: f64,
}

impl Default for BoostedTreesTrainer {
    fn default() -> Self {
        Self {
            lambda: 1.0,
            min_child_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedTrees {
    n_features: usize,
    base_margin: f64,
    trees: Vec<RegressionTree>,
}

impl BoostedTrees {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw log-odds for one row.
    pub fn margin(&self, row: &[f64]) -> f64 {
        self.base_margin + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Trainer for BoostedTreesTrainer {
    type Model = BoostedTrees;

    fn name(&self) -> &str {
        "boosted_trees"
    }

    fn train(
        &self,
        x: &FeatureMatrix,
        y: &[u8],
        params: &HyperParams,
    ) -> Result<BoostedTrees, ModelError> {
        validate_training_input(x, y, params)?;

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            lambda: self.lambda,
            min_child_weight: self.min_child_weight,
        };
        let n = x.n_rows();
        let mut margins = vec![0.0; n];
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            for i in 0..n {
                let p = sigmoid(margins[i]);
                grad[i] = p - f64::from(y[i]);
                hess[i] = (p * (1.0 - p)).max(1e-16);
            }
            let mut tree = RegressionTree::fit(x, &grad, &hess, &tree_params);
            tree.scale_leaves(params.learning_rate);
            for (m, row) in margins.iter_mut().zip(x.rows()) {
                *m += tree.predict_row(row);
            }
            trees.push(tree);
        }

        debug!(
            "trained {} trees on {} rows x {} features ({})",
            trees.len(),
            n,
            x.n_cols(),
            params
        );

        Ok(BoostedTrees {
            n_features: x.n_cols(),
            base_margin: 0.0,
            trees,
        })
    }
}

impl Classifier for BoostedTrees {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        if x.n_cols() != self.n_features {
            return Err(ModelError::FeatureMismatch {
                expected: self.n_features,
                actual: x.n_cols(),
            });
        }
        Ok(x.rows().map(|row| sigmoid(self.margin(row))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(n_estimators: usize, learning_rate: f64) -> HyperParams {
        HyperParams {
            lags: 0,
            max_depth: 3,
            n_estimators,
            learning_rate,
        }
    }

    fn separable() -> (FeatureMatrix, Vec<u8>) {
        let data: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y = (0..20).map(|i| u8::from(i >= 10)).collect();
        (FeatureMatrix::new(20, 1, data).unwrap(), y)
    }

    #[test]
    fn learns_separable_data() {
        let (x, y) = separable();
        let model = BoostedTreesTrainer::default()
            .train(&x, &y, &params(50, 0.3))
            .unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn small_learning_rate_stays_near_half() {
        let (x, y) = separable();
        let model = BoostedTreesTrainer::default()
            .train(&x, &y, &params(5, 0.001))
            .unwrap();
        let probs = model.predict_proba(&x).unwrap();
        assert!(probs.iter().all(|p| (p - 0.5).abs() < 0.01));
        // ordering is still right
        assert!(probs[0] < probs[19]);
    }

    #[test]
    fn training_is_deterministic() {
        let (x, y) = separable();
        let trainer = BoostedTreesTrainer::default();
        let a = trainer.train(&x, &y, &params(10, 0.1)).unwrap();
        let b = trainer.train(&x, &y, &params(10, 0.1)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn probability_at_half_predicts_negative() {
        let model = BoostedTrees {
            n_features: 1,
            base_margin: 0.0,
            trees: vec![],
        };
        let x = FeatureMatrix::new(1, 1, vec![0.0]).unwrap();
        assert_eq!(model.predict_proba(&x).unwrap(), vec![0.5]);
        assert_eq!(model.predict(&x).unwrap(), vec![0]);
    }

    #[test]
    fn rejects_bad_input() {
        let (x, y) = separable();
        let trainer = BoostedTreesTrainer::default();
        assert_eq!(
            trainer.train(&x, &y[..5], &params(1, 0.1)),
            Err(ModelError::LabelMismatch { rows: 20, labels: 5 })
        );
        assert_eq!(
            trainer.train(&FeatureMatrix::empty(1), &[], &params(1, 0.1)),
            Err(ModelError::EmptyTrainingSet)
        );
        assert!(matches!(
            trainer.train(&x, &y, &params(0, 0.1)),
            Err(ModelError::InvalidParams(_))
        ));
        let model = trainer.train(&x, &y, &params(1, 0.1)).unwrap();
        assert_eq!(
            model.predict_proba(&FeatureMatrix::empty(3)),
            Err(ModelError::FeatureMismatch { expected: 1, actual: 3 })
        );
    }

    #[test]
    fn serde_round_trip() {
        let (x, y) = separable();
        let model = BoostedTreesTrainer::default()
            .train(&x, &y, &params(3, 0.1))
            .unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let back: BoostedTrees = serde_json::from_str(&json).unwrap();
        assert_eq!(model.predict_proba(&x).unwrap(), back.predict_proba(&x).unwrap());
    }
}
