//! Binary classification metrics: confusion counts, F-beta, and the
//! precision/recall curve used for threshold selection.

use serde::{Deserialize, Serialize};

/// Confusion counts for a binary decision vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl Confusion {
    pub fn from_labels(y_true: &[u8], y_pred: &[u8]) -> Self {
        let mut c = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t == 1, p == 1) {
                (true, true) => c.tp += 1,
                (false, true) => c.fp += 1,
                (false, false) => c.tn += 1,
                (true, false) => c.fn_ += 1,
            }
        }
        c
    }

    /// Precision; `0.0` when nothing was predicted positive.
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// Recall; `0.0` when there are no positives.
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn fbeta(&self, beta: f64) -> f64 {
        fbeta_from(self.precision(), self.recall(), beta)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// F-beta from precision and recall. Zero when both are zero.
pub fn fbeta_from(precision: f64, recall: f64, beta: f64) -> f64 {
    let b2 = beta * beta;
    let den = b2 * precision + recall;
    if den <= 0.0 {
        0.0
    } else {
        (1.0 + b2) * precision * recall / den
    }
}

/// F-beta of binary predictions against binary truth.
pub fn fbeta_score(y_true: &[u8], y_pred: &[u8], beta: f64) -> f64 {
    Confusion::from_labels(y_true, y_pred).fbeta(beta)
}

/// The four scores recorded for every trial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    pub train_f1: f64,
    pub train_f2: f64,
    pub eval_f1: f64,
    pub eval_f2: f64,
}

impl ScoreSet {
    pub fn compute(
        train_true: &[u8],
        train_pred: &[u8],
        eval_true: &[u8],
        eval_pred: &[u8],
    ) -> Self {
        let train = Confusion::from_labels(train_true, train_pred);
        let eval = Confusion::from_labels(eval_true, eval_pred);
        Self {
            train_f1: train.fbeta(1.0),
            train_f2: train.fbeta(2.0),
            eval_f1: eval.fbeta(1.0),
            eval_f2: eval.fbeta(2.0),
        }
    }

    /// Sum of the evaluation-side scores; the search maximizes this.
    pub fn eval_combined(&self) -> f64 {
        self.eval_f1 + self.eval_f2
    }
}

/// One point of the precision/recall curve: predicting `prob >= threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub threshold: f64,
    pub precision: f64,
    pub recall: f64,
}

/// Precision/recall at every distinct score, thresholds ascending.
///
/// Returns `None` when `y_true` holds no positives, since recall is undefined,
/// or when any score is not finite.
pub fn precision_recall_curve(y_true: &[u8], scores: &[f64]) -> Option<Vec<CurvePoint>> {
    let total_pos = y_true.iter().filter(|&&y| y == 1).count();
    if total_pos == 0 || scores.is_empty() || scores.iter().any(|s| !s.is_finite()) {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    // Walk scores descending, emitting a point after each run of equal scores.
    let mut points = Vec::new();
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        while i < order.len() && scores[order[i]].total_cmp(&threshold).is_eq() {
            if y_true[order[i]] == 1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push(CurvePoint {
            threshold,
            precision: ratio(tp, tp + fp),
            recall: ratio(tp, total_pos),
        });
    }
    points.reverse();
    Some(points)
}

/// The point maximizing F-beta; ties go to the lowest threshold.
pub fn best_fbeta_point(curve: &[CurvePoint], beta: f64) -> Option<(CurvePoint, f64)> {
    let mut best: Option<(CurvePoint, f64)> = None;
    for point in curve {
        let score = fbeta_from(point.precision, point.recall, beta);
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((*point, score));
        }
    }
    best
}

/// Apply a cutoff: `1` iff `prob >= threshold`.
pub fn apply_threshold(probabilities: &[f64], threshold: f64) -> Vec<u8> {
    probabilities
        .iter()
        .map(|&p| u8::from(p >= threshold))
        .collect()
}
