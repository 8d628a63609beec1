//! Bayesian hyperparameter search.
//!
//! Runs `n_calls` trials. The first `n_initial_points` are drawn uniformly
//! from the search space; every later proposal maximises expected
//! improvement under a GP fitted to all observations so far (degenerate
//! trials included, at the sentinel objective). Only scored trials enter the
//! store. The search stops early when no unevaluated configuration remains.
//!
//! All randomness comes from named `RngHierarchy` streams keyed by trial
//! index, so a fixed seed reproduces the whole run.

use std::collections::HashSet;
use std::time::Instant;

use log::{debug, info};
use rand::seq::IteratorRandom;
use shelterlab_core::{HyperParams, ParamKey, RngHierarchy, Trainer};
use thiserror::Error;

use crate::acquisition::{AcquisitionError, ExpectedImprovement};
use crate::config::SearchConfig;
use crate::fitness::SelectionMetric;
use crate::leaderboard::BestByMetric;
use crate::objective::{Degenerate, TrialData, TrialError, TrialOutcome};
use crate::space::{SearchSpace, SpaceError, DIMS};
use crate::store::{TrialResult, TrialStore};
use crate::surrogate::{GaussianProcess, SurrogateError};

const BOOTSTRAP_STREAM: &str = "bootstrap";
const ACQUISITION_STREAM: &str = "acquisition";

/// Draws per bootstrap trial before giving up on finding a fresh config.
const BOOTSTRAP_ATTEMPTS: usize = 256;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Space(#[from] SpaceError),
    #[error(transparent)]
    Trial(#[from] TrialError),
    #[error(transparent)]
    Surrogate(#[from] SurrogateError),
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    #[error("{operation} called while the search is {phase:?}")]
    InvalidPhase {
        operation: &'static str,
        phase: SearchPhase,
    },
}

/// Where the engine is in its propose / evaluate / record cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Proposing,
    Evaluating,
    Recording,
    Selecting,
    Done,
}

/// Snapshot handed to the progress callback after each trial.
#[derive(Debug, Clone)]
pub struct SearchProgress {
    pub trial: usize,
    pub n_calls: usize,
    pub params: HyperParams,
    pub objective: f64,
    pub best_objective: f64,
    pub degenerate: Option<Degenerate>,
    pub elapsed_secs: f64,
}

/// Proposal and bookkeeping state of one search, independent of how trials
/// are evaluated.
#[derive(Debug)]
pub struct SearchEngine {
    config: SearchConfig,
    rng: RngHierarchy,
    acquisition: ExpectedImprovement,
    phase: SearchPhase,
    pending: Option<HyperParams>,
    points: Vec<[f64; DIMS]>,
    values: Vec<f64>,
    evaluated: HashSet<ParamKey>,
}

impl SearchEngine {
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        config.bounds.validate()?;
        let acquisition = ExpectedImprovement::new(config.xi)?;
        Ok(Self {
            rng: RngHierarchy::new(config.seed),
            config,
            acquisition,
            phase: SearchPhase::Idle,
            pending: None,
            points: Vec::new(),
            values: Vec::new(),
            evaluated: HashSet::new(),
        })
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    /// Configuration handed out by the last `propose` and not yet recorded.
    pub fn pending(&self) -> Option<&HyperParams> {
        self.pending.as_ref()
    }

    pub fn space(&self) -> &SearchSpace {
        &self.config.bounds
    }

    /// Number of trials observed so far.
    pub fn trials_run(&self) -> usize {
        self.values.len()
    }

    /// Lowest objective observed, or `+inf` before the first trial.
    pub fn best_objective(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    fn transition(&mut self, to: SearchPhase) {
        debug!("search phase {:?} -> {:?}", self.phase, to);
        self.phase = to;
    }

    /// Next configuration to evaluate, or `None` once the budget is spent or
    /// the space holds no unevaluated configuration.
    pub fn propose(&mut self) -> Result<Option<HyperParams>, SearchError> {
        if !matches!(self.phase, SearchPhase::Idle | SearchPhase::Recording) {
            return Err(SearchError::InvalidPhase {
                operation: "propose",
                phase: self.phase,
            });
        }
        let trial = self.trials_run();
        if trial >= self.config.n_calls {
            return Ok(None);
        }
        self.transition(SearchPhase::Proposing);

        let proposal = if trial < self.config.n_initial_points || self.values.is_empty() {
            self.bootstrap_proposal(trial)
        } else {
            self.acquisition_proposal(trial)?
        };

        match proposal {
            Some(params) => {
                self.pending = Some(params);
                self.transition(SearchPhase::Evaluating);
            }
            None => {
                info!("search space exhausted after {trial} trials");
                self.transition(SearchPhase::Recording);
            }
        }
        Ok(proposal)
    }

    fn bootstrap_proposal(&self, trial: usize) -> Option<HyperParams> {
        let space = &self.config.bounds;
        let mut rng = self.rng.rng_for(BOOTSTRAP_STREAM, trial as u64);
        let sampled = (0..BOOTSTRAP_ATTEMPTS)
            .map(|_| space.sample(&mut rng))
            .find(|p| !self.evaluated.contains(&p.key()));
        if sampled.is_some() {
            return sampled;
        }
        // discrete spaces: pick among what is left instead of giving up
        space.configurations().and_then(|all| {
            all.filter(|p| !self.evaluated.contains(&p.key()))
                .choose(&mut rng)
        })
    }

    fn acquisition_proposal(&self, trial: usize) -> Result<Option<HyperParams>, SearchError> {
        let gp = GaussianProcess::fit(&self.points, &self.values)?;
        let mut rng = self.rng.rng_for(ACQUISITION_STREAM, trial as u64);
        Ok(self.acquisition.propose(
            &gp,
            &self.config.bounds,
            &mut rng,
            self.config.acq_candidates,
            self.best_objective(),
            &self.evaluated,
        ))
    }

    /// Feed back the objective of an evaluated configuration.
    ///
    /// Configurations outside the search space are rejected; they would
    /// corrupt the surrogate's unit-cube encoding.
    pub fn record(&mut self, params: &HyperParams, objective: f64) -> Result<(), SearchError> {
        if self.phase == SearchPhase::Evaluating {
            self.transition(SearchPhase::Recording);
        } else if !matches!(self.phase, SearchPhase::Idle | SearchPhase::Recording) {
            return Err(SearchError::InvalidPhase {
                operation: "record",
                phase: self.phase,
            });
        }
        self.config.bounds.check(params)?;
        if !objective.is_finite() {
            return Err(SurrogateError::NonFinite(objective).into());
        }
        self.pending = None;
        self.points.push(self.config.bounds.encode(params));
        self.values.push(objective);
        self.evaluated.insert(params.key());
        Ok(())
    }

    /// Close the search and pick the per-metric winners.
    pub fn select<M>(&mut self, store: &TrialStore<M>) -> BestByMetric {
        self.transition(SearchPhase::Selecting);
        let best = BestByMetric::select(store.results());
        self.transition(SearchPhase::Done);
        best
    }
}

/// Everything a finished search produced.
#[derive(Debug, Clone)]
pub struct SearchOutcome<M> {
    pub store: TrialStore<M>,
    pub best: BestByMetric,
    pub trials_run: usize,
    pub degenerate_trials: usize,
    pub stopped_early: bool,
    pub elapsed_secs: f64,
}

impl<M> SearchOutcome<M> {
    pub fn best_result(
        &self,
        metric: SelectionMetric,
    ) -> Option<&TrialResult<M>> {
        self.best
            .get(metric)
            .and_then(|e| self.store.results().get(e.index))
    }
}

// ─── Search loop ─────────────────────────────────────────────────────

/// Run a full search over `data` with `trainer`.
///
/// `progress_cb` is called once after every trial.
pub fn run_search<T: Trainer>(
    config: &SearchConfig,
    data: &TrialData<'_>,
    trainer: &T,
    progress_cb: Option<&dyn Fn(&SearchProgress)>,
) -> Result<SearchOutcome<T::Model>, SearchError> {
    let start = Instant::now();
    let mut engine = SearchEngine::new(config.clone())?;
    let mut store = TrialStore::new();
    let mut degenerate_trials = 0;

    info!(
        "search: {} calls ({} initial), seed {}, cutoff {}, trainer {}",
        config.n_calls,
        config.n_initial_points,
        config.seed,
        data.cutoff,
        trainer.name()
    );

    while let Some(params) = engine.propose()? {
        let trial = engine.trials_run();
        let outcome = data.evaluate(trainer, &params)?;
        let objective = outcome.objective();
        engine.record(&params, objective)?;

        let degenerate = match outcome {
            TrialOutcome::Scored(eval) => {
                store.record(TrialResult {
                    trial,
                    params,
                    normalizer: eval.normalizer,
                    model: eval.model,
                    feature_names: eval.feature_names,
                    scores: eval.scores,
                    objective,
                });
                None
            }
            TrialOutcome::Degenerate(reason) => {
                degenerate_trials += 1;
                Some(reason)
            }
        };

        info!(
            "trial {}/{}: {params} objective={objective:.4} best={:.4}",
            trial + 1,
            config.n_calls,
            engine.best_objective()
        );

        if let Some(cb) = progress_cb {
            cb(&SearchProgress {
                trial,
                n_calls: config.n_calls,
                params,
                objective,
                best_objective: engine.best_objective(),
                degenerate,
                elapsed_secs: start.elapsed().as_secs_f64(),
            });
        }
    }

    let trials_run = engine.trials_run();
    let best = engine.select(&store);
    info!(
        "search done: {trials_run} trials, {} stored, {degenerate_trials} degenerate",
        store.len()
    );

    Ok(SearchOutcome {
        store,
        best,
        trials_run,
        degenerate_trials,
        stopped_early: trials_run < config.n_calls,
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_space() -> SearchSpace {
        SearchSpace {
            lags: (0, 1),
            max_depth: (2, 2),
            n_estimators: (5, 5),
            learning_rate: (0.1, 0.1),
        }
    }

    fn config(n_calls: usize, n_initial_points: usize) -> SearchConfig {
        SearchConfig {
            n_calls,
            n_initial_points,
            acq_candidates: 50,
            bounds: tiny_space(),
            ..SearchConfig::default()
        }
    }

    #[test]
    fn bootstrap_proposals_are_seeded() {
        let cfg = SearchConfig {
            n_calls: 3,
            n_initial_points: 3,
            ..SearchConfig::default()
        };
        let mut a = SearchEngine::new(cfg.clone()).unwrap();
        let mut b = SearchEngine::new(cfg).unwrap();
        for _ in 0..3 {
            let pa = a.propose().unwrap().unwrap();
            let pb = b.propose().unwrap().unwrap();
            assert_eq!(pa.key(), pb.key());
            a.record(&pa, -0.5).unwrap();
            b.record(&pb, -0.5).unwrap();
        }
        assert!(a.propose().unwrap().is_none());
    }

    #[test]
    fn exhausted_space_stops_early() {
        let mut engine = SearchEngine::new(config(10, 1)).unwrap();
        let mut seen = Vec::new();
        while let Some(p) = engine.propose().unwrap() {
            seen.push(p.lags);
            engine.record(&p, -(p.lags as f64)).unwrap();
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1]);
        assert_eq!(engine.trials_run(), 2);
        assert_eq!(engine.best_objective(), -1.0);
    }

    #[test]
    fn discrete_space_is_searched_to_the_last_config() {
        // bootstrap-only over 120 configs, then EI with a single random
        // candidate over 30
        let space = |lags, n_estimators| SearchSpace {
            lags,
            max_depth: (1, 5),
            n_estimators,
            learning_rate: (0.1, 0.1),
        };
        let cases = [(space((0, 3), (10, 15)), 120), (space((0, 2), (10, 11)), 1)];
        for (space, n_initial_points) in cases {
            let total = space.cardinality().unwrap();
            let cfg = SearchConfig {
                n_calls: total,
                n_initial_points,
                acq_candidates: 1,
                bounds: space,
                ..SearchConfig::default()
            };
            let mut engine = SearchEngine::new(cfg).unwrap();
            let mut seen = HashSet::new();
            while let Some(p) = engine.propose().unwrap() {
                assert!(seen.insert(p.key()));
                let objective = -((p.lags + p.max_depth + p.n_estimators) as f64) / 30.0;
                engine.record(&p, objective).unwrap();
            }
            assert_eq!(engine.trials_run(), total);
        }
    }

    #[test]
    fn out_of_bounds_record_is_rejected() {
        let mut engine = SearchEngine::new(config(5, 1)).unwrap();
        let params = HyperParams {
            lags: 7,
            max_depth: 2,
            n_estimators: 5,
            learning_rate: 0.1,
        };
        assert!(matches!(
            engine.record(&params, -1.0),
            Err(SearchError::Space(_))
        ));
        assert_eq!(engine.trials_run(), 0);
    }

    #[test]
    fn propose_twice_without_record_is_a_phase_error() {
        let mut engine = SearchEngine::new(config(5, 1)).unwrap();
        let proposed = engine.propose().unwrap().unwrap();
        assert_eq!(engine.phase(), SearchPhase::Evaluating);
        assert_eq!(engine.pending().map(|p| p.key()), Some(proposed.key()));
        assert!(matches!(
            engine.propose(),
            Err(SearchError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn select_finishes_the_search() {
        let mut engine = SearchEngine::new(config(1, 1)).unwrap();
        let store: TrialStore<()> = TrialStore::new();
        let best = engine.select(&store);
        assert!(best.is_empty());
        assert_eq!(engine.phase(), SearchPhase::Done);
    }

    #[test]
    fn invalid_bounds_fail_construction() {
        let mut cfg = config(5, 1);
        cfg.bounds.max_depth = (0, 3);
        assert!(matches!(SearchEngine::new(cfg), Err(SearchError::Space(_))));
    }
}
