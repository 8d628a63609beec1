//! TOML configuration for search and calibration.
//!
//! Every section has defaults, so a minimal file only needs the `[schema]`
//! identity and target columns.

use std::path::Path;

use serde::{Deserialize, Serialize};
use shelterlab_core::{Period, SubgroupDimension};
use thiserror::Error;

use crate::space::{SearchSpace, SpaceError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid search bounds: {0}")]
    Space(#[from] SpaceError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Column roles of the input panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub entity_column: String,
    pub period_column: String,
    pub target: String,
    /// Explicit base features; empty means every numeric column not claimed
    /// by another role, minus `exclude`.
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Columns to read as strings even when they look numeric.
    #[serde(default)]
    pub categorical: Vec<String>,
}

fn default_n_calls() -> usize {
    60
}
fn default_n_initial_points() -> usize {
    5
}
fn default_seed() -> u64 {
    42
}
fn default_acq_candidates() -> usize {
    1000
}
fn default_xi() -> f64 {
    0.01
}

/// Budget, seed and bounds of the Bayesian search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_n_calls")]
    pub n_calls: usize,
    #[serde(default = "default_n_initial_points")]
    pub n_initial_points: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_acq_candidates")]
    pub acq_candidates: usize,
    #[serde(default = "default_xi")]
    pub xi: f64,
    /// Evaluation period; defaults to the panel's latest period.
    #[serde(default)]
    pub cutoff: Option<Period>,
    #[serde(default)]
    pub bounds: SearchSpace,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_calls: default_n_calls(),
            n_initial_points: default_n_initial_points(),
            seed: default_seed(),
            acq_candidates: default_acq_candidates(),
            xi: default_xi(),
            cutoff: None,
            bounds: SearchSpace::default(),
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bounds.validate()?;
        if self.acq_candidates == 0 {
            return Err(ConfigError::Invalid("acq_candidates must be > 0".into()));
        }
        if !(self.xi.is_finite() && self.xi >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "xi must be finite and >= 0, got {}",
                self.xi
            )));
        }
        Ok(())
    }
}

fn default_beta() -> f64 {
    2.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_beta")]
    pub beta: f64,
    #[serde(default)]
    pub dimensions: Vec<SubgroupDimension>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            beta: default_beta(),
            dimensions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShelterConfig {
    pub schema: SchemaConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
}

impl ShelterConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.search.validate()?;
        if !(self.calibration.beta.is_finite() && self.calibration.beta > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "calibration beta must be positive, got {}",
                self.calibration.beta
            )));
        }
        for dim in &self.calibration.dimensions {
            if dim.members.is_empty() && dim.column.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "dimension '{}' needs members or a label column",
                    dim.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[schema]
entity_column = "zip_code"
period_column = "year"
target = "homeless_individuals_count"
exclude = ["city"]

[search]
n_calls = 30
seed = 7
cutoff = 2021

[search.bounds]
lags = [1, 2]
learning_rate = [0.001, 0.002]

[calibration]
beta = 2.0

[[calibration.dimensions]]
name = "gender"
members = ["male", "female"]

[[calibration.dimensions]]
name = "age"
members = ["age_below_24", "age_above_45"]
population_prefix = "pop_"
"#;

    #[test]
    fn parses_full_config() {
        let config = ShelterConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.search.n_calls, 30);
        assert_eq!(config.search.n_initial_points, 5);
        assert_eq!(config.search.seed, 7);
        assert_eq!(config.search.cutoff, Some(2021));
        assert_eq!(config.search.bounds.lags, (1, 2));
        assert_eq!(config.search.bounds.max_depth, (6, 9));
        assert_eq!(config.calibration.dimensions.len(), 2);
        assert_eq!(
            config.calibration.dimensions[0].population_prefix,
            "population_"
        );
        assert_eq!(config.calibration.dimensions[1].population_prefix, "pop_");
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = ShelterConfig::from_toml_str(
            "[schema]\nentity_column = \"zip\"\nperiod_column = \"year\"\ntarget = \"count\"\n",
        )
        .unwrap();
        assert_eq!(config.search, SearchConfig::default());
        assert_eq!(config.search.n_calls, 60);
        assert_eq!(config.search.acq_candidates, 1000);
        assert_eq!(config.calibration.beta, 2.0);
        assert!(config.schema.features.is_empty());
    }

    #[test]
    fn invalid_bounds_rejected() {
        let text = "[schema]\nentity_column = \"zip\"\nperiod_column = \"year\"\ntarget = \"c\"\n\
                    [search.bounds]\nmax_depth = [9, 6]\n";
        assert!(matches!(
            ShelterConfig::from_toml_str(text),
            Err(ConfigError::Space(_))
        ));
    }

    #[test]
    fn non_positive_beta_rejected() {
        let text = "[schema]\nentity_column = \"zip\"\nperiod_column = \"year\"\ntarget = \"c\"\n\
                    [calibration]\nbeta = 0.0\n";
        assert!(matches!(
            ShelterConfig::from_toml_str(text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn dimension_needs_members_or_label_column() {
        let base = "[schema]\nentity_column = \"zip\"\nperiod_column = \"year\"\ntarget = \"c\"\n";
        let bare = format!("{base}[[calibration.dimensions]]\nname = \"gender\"\n");
        assert!(matches!(
            ShelterConfig::from_toml_str(&bare),
            Err(ConfigError::Invalid(_))
        ));
        let labelled = format!(
            "{base}[[calibration.dimensions]]\nname = \"gender\"\ncolumn = \"gender_majority\"\n"
        );
        let config = ShelterConfig::from_toml_str(&labelled).unwrap();
        assert_eq!(
            config.calibration.dimensions[0].label_column(),
            "gender_majority"
        );
    }

    #[test]
    fn toml_round_trip() {
        let config = ShelterConfig::from_toml_str(FULL).unwrap();
        let text = config.to_toml_string().unwrap();
        assert_eq!(ShelterConfig::from_toml_str(&text).unwrap(), config);
    }
}
