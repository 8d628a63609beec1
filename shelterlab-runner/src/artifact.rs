//! Model artifact store: one JSON file per (metric, configuration).
//!
//! File names encode the configuration tuple, so an artifact is addressable
//! both by selection metric and by exact hyperparameters:
//! `{metric}_{lags}_{max_depth}_{n_estimators}_{learning_rate:.6}.json`.
//! Every artifact carries a `schema_version`; newer versions are rejected.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shelterlab_core::{HyperParams, Period, ScoreSet, StandardScaler};

use crate::fitness::SelectionMetric;
use crate::search::SearchOutcome;
use crate::store::TrialResult;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact<M> {
    pub schema_version: u32,
    pub metric: SelectionMetric,
    pub trainer: String,
    pub params: HyperParams,
    /// BLAKE3 hex digest of `params`, computed when the trial was saved.
    pub fingerprint: String,
    pub cutoff: Period,
    pub feature_names: Vec<String>,
    pub normalizer: StandardScaler,
    pub model: M,
    pub scores: ScoreSet,
    pub objective: f64,
    pub created_at: DateTime<Utc>,
}

impl<M: Clone> ModelArtifact<M> {
    pub fn from_trial(
        metric: SelectionMetric,
        trainer: &str,
        cutoff: Period,
        result: &TrialResult<M>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            metric,
            trainer: trainer.to_string(),
            params: result.params,
            fingerprint: result.params.fingerprint().to_hex(),
            cutoff,
            feature_names: result.feature_names.clone(),
            normalizer: result.normalizer.clone(),
            model: result.model.clone(),
            scores: result.scores,
            objective: result.objective,
            created_at: Utc::now(),
        }
    }
}

pub fn artifact_file_name(metric: SelectionMetric, params: &HyperParams) -> String {
    format!(
        "{}_{}_{}_{}_{:.6}.json",
        metric, params.lags, params.max_depth, params.n_estimators, params.learning_rate
    )
}

/// Directory-backed artifact store.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, metric: SelectionMetric, params: &HyperParams) -> PathBuf {
        self.root.join(artifact_file_name(metric, params))
    }

    /// Write an artifact, replacing any previous one for the same
    /// metric and configuration.
    pub fn save<M: Serialize>(&self, artifact: &ModelArtifact<M>) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        let path = self.path_for(artifact.metric, &artifact.params);
        let json = serde_json::to_string_pretty(artifact)
            .context("failed to serialize model artifact")?;
        fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("saved {} artifact to {}", artifact.metric, path.display());
        Ok(path)
    }

    /// Persist the winner of every selection metric. Returns the written paths.
    pub fn save_outcome<M: Serialize + Clone>(
        &self,
        outcome: &SearchOutcome<M>,
        trainer: &str,
        cutoff: Period,
    ) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for metric in SelectionMetric::ALL {
            if let Some(result) = outcome.best_result(metric) {
                let artifact = ModelArtifact::from_trial(metric, trainer, cutoff, result);
                paths.push(self.save(&artifact)?);
            }
        }
        Ok(paths)
    }

    pub fn load<M: DeserializeOwned>(&self, path: &Path) -> Result<ModelArtifact<M>> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let artifact: ModelArtifact<M> = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        if artifact.schema_version > SCHEMA_VERSION {
            bail!(
                "unsupported schema version {} in {} (max supported: {})",
                artifact.schema_version,
                path.display(),
                SCHEMA_VERSION
            );
        }
        Ok(artifact)
    }

    pub fn load_by_params<M: DeserializeOwned>(
        &self,
        metric: SelectionMetric,
        params: &HyperParams,
    ) -> Result<ModelArtifact<M>> {
        self.load(&self.path_for(metric, params))
    }

    /// Most recently created artifact saved for `metric`.
    pub fn load_by_metric<M: DeserializeOwned>(
        &self,
        metric: SelectionMetric,
    ) -> Result<ModelArtifact<M>> {
        let mut newest: Option<ModelArtifact<M>> = None;
        for path in self.list()? {
            if metric_of(&path) != Some(metric) {
                continue;
            }
            let artifact = self.load(&path)?;
            if newest
                .as_ref()
                .map_or(true, |n| artifact.created_at > n.created_at)
            {
                newest = Some(artifact);
            }
        }
        newest.with_context(|| {
            format!("no {metric} artifact in {}", self.root.display())
        })
    }

    /// Artifact files in the store, sorted by name.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("failed to list {}", self.root.display()))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") && metric_of(&path).is_some() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

fn metric_of(path: &Path) -> Option<SelectionMetric> {
    let stem = path.file_stem()?.to_str()?;
    stem.split('_').next()?.parse().ok()
}
