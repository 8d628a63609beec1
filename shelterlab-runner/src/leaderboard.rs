//! Per-metric best trial.
//!
//! One slot per `SelectionMetric`, filled in a single pass over the trial
//! store. A later trial replaces a slot only when it is strictly better, so
//! ties keep the earlier trial. Different metrics may pick different trials.

use crate::fitness::SelectionMetric;
use crate::store::TrialResult;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestEntry {
    /// Position of the winner in the store's result list.
    pub index: usize,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BestByMetric {
    slots: [Option<BestEntry>; 3],
}

impl BestByMetric {
    pub fn select<M>(results: &[TrialResult<M>]) -> Self {
        let mut best = Self::default();
        for (index, result) in results.iter().enumerate() {
            for metric in SelectionMetric::ALL {
                let value = metric.extract(&result.scores);
                if !value.is_finite() {
                    continue;
                }
                let slot = &mut best.slots[metric.index()];
                if slot.map_or(true, |b| metric.is_better(value, b.value)) {
                    *slot = Some(BestEntry { index, value });
                }
            }
        }
        best
    }

    pub fn get(&self, metric: SelectionMetric) -> Option<BestEntry> {
        self.slots[metric.index()]
    }

    /// `(metric, entry)` for every filled slot.
    pub fn iter(&self) -> impl Iterator<Item = (SelectionMetric, BestEntry)> + '_ {
        SelectionMetric::ALL
            .into_iter()
            .filter_map(|m| self.get(m).map(|e| (m, e)))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}
