//! Temporal train/evaluation split.
//!
//! Training rows are strictly older than the cutoff period; evaluation rows
//! are exactly the cutoff period. Rows newer than the cutoff belong to neither.

use crate::features::LaggedFrame;
use crate::panel::Period;

#[derive(Debug, Clone)]
pub struct TemporalSplit {
    pub cutoff: Period,
    pub train: LaggedFrame,
    pub eval: LaggedFrame,
}

impl TemporalSplit {
    /// True when the evaluation side has no rows, i.e. no score is computable.
    pub fn eval_is_empty(&self) -> bool {
        self.eval.is_empty()
    }
}

pub fn split_at(frame: &LaggedFrame, cutoff: Period) -> TemporalSplit {
    let (train_idx, eval_idx) = split_indices(&frame.periods, cutoff);
    TemporalSplit {
        cutoff,
        train: frame.select(&train_idx),
        eval: frame.select(&eval_idx),
    }
}

/// Row indices for the training (`< cutoff`) and evaluation (`== cutoff`) sides.
pub fn split_indices(periods: &[Period], cutoff: Period) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::new();
    let mut eval = Vec::new();
    for (i, &p) in periods.iter().enumerate() {
        if p < cutoff {
            train.push(i);
        } else if p == cutoff {
            eval.push(i);
        }
    }
    (train, eval)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_by_cutoff() {
        let periods = [2019, 2020, 2021, 2021, 2022];
        let (train, eval) = split_indices(&periods, 2021);
        assert_eq!(train, vec![0, 1]);
        assert_eq!(eval, vec![2, 3]);
    }

    #[test]
    fn no_rows_at_cutoff_gives_empty_eval() {
        let periods = [2019, 2020];
        let (train, eval) = split_indices(&periods, 2021);
        assert_eq!(train.len(), 2);
        assert!(eval.is_empty());
    }

    #[test]
    fn empty_input() {
        let (train, eval) = split_indices(&[], 2021);
        assert!(train.is_empty() && eval.is_empty());
    }
}
