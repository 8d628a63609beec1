//! Selection metric: which evaluation score picks a winning trial.

use serde::{Deserialize, Serialize};
use shelterlab_core::ScoreSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMetric {
    F1,
    F2,
    /// eval F1 + eval F2, the quantity the search optimizes.
    #[default]
    Combined,
}

impl SelectionMetric {
    pub const ALL: [SelectionMetric; 3] = [Self::F1, Self::F2, Self::Combined];

    /// Extract the evaluation-side value from a score set.
    pub fn extract(&self, scores: &ScoreSet) -> f64 {
        match self {
            Self::F1 => scores.eval_f1,
            Self::F2 => scores.eval_f2,
            Self::Combined => scores.eval_combined(),
        }
    }

    /// Higher is better for every metric.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        a > b
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::F1 => "f1",
            Self::F2 => "f2",
            Self::Combined => "combined",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::F1 => 0,
            Self::F2 => 1,
            Self::Combined => 2,
        }
    }
}

impl std::fmt::Display for SelectionMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for SelectionMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "f1" => Ok(Self::F1),
            "f2" => Ok(Self::F2),
            "combined" => Ok(Self::Combined),
            other => Err(format!("unknown metric '{other}' (expected f1, f2 or combined)")),
        }
    }
}
