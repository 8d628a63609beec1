//! Trial store: every fully evaluated configuration of one search run.
//!
//! Keyed by the bit-exact `ParamKey`; recording a configuration that is
//! already present overwrites it in place, keeping its original position.

use std::collections::HashMap;

use shelterlab_core::{HyperParams, ParamKey, ScoreSet, StandardScaler};

/// A recorded trial: the fitted pair plus its scores.
#[derive(Debug, Clone)]
pub struct TrialResult<M> {
    /// Zero-based trial index within the search.
    pub trial: usize,
    pub params: HyperParams,
    pub normalizer: StandardScaler,
    pub model: M,
    pub feature_names: Vec<String>,
    pub scores: ScoreSet,
    pub objective: f64,
}

/// Outcome of a `record` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordResult {
    Inserted,
    Replaced,
}

#[derive(Debug, Clone)]
pub struct TrialStore<M> {
    results: Vec<TrialResult<M>>,
    index: HashMap<ParamKey, usize>,
}

impl<M> Default for TrialStore<M> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<M> TrialStore<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: TrialResult<M>) -> RecordResult {
        let key = result.params.key();
        match self.index.get(&key) {
            Some(&idx) => {
                self.results[idx] = result;
                RecordResult::Replaced
            }
            None => {
                self.index.insert(key, self.results.len());
                self.results.push(result);
                RecordResult::Inserted
            }
        }
    }

    pub fn get(&self, params: &HyperParams) -> Option<&TrialResult<M>> {
        self.index.get(&params.key()).map(|&i| &self.results[i])
    }

    pub fn contains(&self, params: &HyperParams) -> bool {
        self.index.contains_key(&params.key())
    }

    pub fn results(&self) -> &[TrialResult<M>] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_results(self) -> Vec<TrialResult<M>> {
        self.results
    }
}
