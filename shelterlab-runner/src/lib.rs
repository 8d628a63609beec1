//! ShelterLab Runner: hyperparameter search, subgroup calibration, artifacts.
//!
//! This crate builds on `shelterlab-core` to provide:
//! - TOML configuration and panel preparation (majority labels, schema)
//! - Single-trial objective with degenerate-split handling
//! - Bayesian search: GP surrogate, expected improvement, seeded proposals
//! - Per-metric best trial selection
//! - Per-subgroup F-beta threshold calibration
//! - JSON model artifacts, threshold maps and CSV subgroup reports

pub mod acquisition;
pub mod artifact;
pub mod calibrate;
pub mod config;
pub mod export;
pub mod fitness;
pub mod leaderboard;
pub mod objective;
pub mod prepare;
pub mod search;
pub mod space;
pub mod store;
pub mod surrogate;

pub use acquisition::{AcquisitionError, ExpectedImprovement};
pub use artifact::{artifact_file_name, ArtifactStore, ModelArtifact};
pub use calibrate::{
    Calibration, CalibrationError, DimensionCalibration, SkipReason, SubgroupCalibrator,
    SubgroupReport, ThresholdMap,
};
pub use config::{CalibrationConfig, ConfigError, SchemaConfig, SearchConfig, ShelterConfig};
pub use export::save_calibration;
pub use fitness::SelectionMetric;
pub use leaderboard::{BestByMetric, BestEntry};
pub use objective::{
    Degenerate, Evaluation, TrialData, TrialError, TrialOutcome, SENTINEL_OBJECTIVE,
};
pub use prepare::{load_panel, prepare_panel, PrepareError, PreparedPanel};
pub use search::{
    run_search, SearchEngine, SearchError, SearchOutcome, SearchPhase, SearchProgress,
};
pub use space::{SearchSpace, SpaceError};
pub use store::{RecordResult, TrialResult, TrialStore};
pub use surrogate::{GaussianProcess, SurrogateError};
