//! Single-trial evaluation: lags → split → scale → train → score.
//!
//! The objective is `-(eval F1 + eval F2)`, minimised by the search. A trial
//! whose split cannot produce a meaningful score (empty side or a single
//! class) is reported as degenerate and scores the sentinel instead of
//! failing the search.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shelterlab_core::{
    build_lagged, split_at, Classifier, FeatureError, HyperParams, LaggedFrame, ModelError,
    NormalizeError, PanelSchema, PanelTable, Period, ScoreSet, StandardScaler, Trainer,
};

/// Worst value the objective can take: both F-scores zero.
pub const SENTINEL_OBJECTIVE: f64 = 0.0;

#[derive(Debug, Error, PartialEq)]
pub enum TrialError {
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Why a trial could not be scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Degenerate {
    EmptyTrain,
    EmptyEval,
    SingleClassTrain,
    SingleClassEval,
}

impl std::fmt::Display for Degenerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::EmptyTrain => "no training rows before the cutoff",
            Self::EmptyEval => "no evaluation rows at the cutoff",
            Self::SingleClassTrain => "training labels contain a single class",
            Self::SingleClassEval => "evaluation labels contain a single class",
        };
        f.write_str(s)
    }
}

/// A fully evaluated trial.
#[derive(Debug, Clone)]
pub struct Evaluation<M> {
    pub normalizer: StandardScaler,
    pub model: M,
    pub feature_names: Vec<String>,
    pub scores: ScoreSet,
    pub n_train: usize,
    pub n_eval: usize,
}

impl<M> Evaluation<M> {
    pub fn objective(&self) -> f64 {
        -self.scores.eval_combined()
    }
}

#[derive(Debug, Clone)]
pub enum TrialOutcome<M> {
    Scored(Evaluation<M>),
    Degenerate(Degenerate),
}

impl<M> TrialOutcome<M> {
    pub fn objective(&self) -> f64 {
        match self {
            Self::Scored(e) => e.objective(),
            Self::Degenerate(_) => SENTINEL_OBJECTIVE,
        }
    }
}

fn single_class(frame: &LaggedFrame) -> bool {
    let positives = frame.positive_count();
    positives == 0 || positives == frame.len()
}

/// Panel, schema and cutoff shared by every trial of a search.
#[derive(Debug, Clone, Copy)]
pub struct TrialData<'a> {
    pub table: &'a PanelTable,
    pub schema: &'a PanelSchema,
    pub cutoff: Period,
}

impl<'a> TrialData<'a> {
    /// Use the panel's latest period as the cutoff unless one is given.
    pub fn new(table: &'a PanelTable, schema: &'a PanelSchema, cutoff: Option<Period>) -> Self {
        Self {
            table,
            schema,
            cutoff: cutoff.or_else(|| table.max_period()).unwrap_or_default(),
        }
    }

    pub fn evaluate<T: Trainer>(
        &self,
        trainer: &T,
        params: &HyperParams,
    ) -> Result<TrialOutcome<T::Model>, TrialError> {
        let frame = build_lagged(self.table, self.schema, params.lags)?;
        let split = split_at(&frame, self.cutoff);

        let degenerate = if split.train.is_empty() {
            Some(Degenerate::EmptyTrain)
        } else if split.eval_is_empty() {
            Some(Degenerate::EmptyEval)
        } else if single_class(&split.train) {
            Some(Degenerate::SingleClassTrain)
        } else if single_class(&split.eval) {
            Some(Degenerate::SingleClassEval)
        } else {
            None
        };
        if let Some(reason) = degenerate {
            warn!("degenerate trial ({params}): {reason}");
            return Ok(TrialOutcome::Degenerate(reason));
        }
        debug!(
            "trial ({params}): train {} rows ({} positive), eval {} rows ({} positive)",
            split.train.len(),
            split.train.positive_count(),
            split.eval.len(),
            split.eval.positive_count()
        );

        let normalizer = StandardScaler::fit(&split.train.features)?;
        let x_train = normalizer.transform(&split.train.features)?;
        let x_eval = normalizer.transform(&split.eval.features)?;

        let model = trainer.train(&x_train, &split.train.labels, params)?;
        let train_pred = model.predict(&x_train)?;
        let eval_pred = model.predict(&x_eval)?;
        let scores = ScoreSet::compute(
            &split.train.labels,
            &train_pred,
            &split.eval.labels,
            &eval_pred,
        );

        Ok(TrialOutcome::Scored(Evaluation {
            normalizer,
            model,
            feature_names: frame.feature_names,
            scores,
            n_train: split.train.len(),
            n_eval: split.eval.len(),
        }))
    }
}
