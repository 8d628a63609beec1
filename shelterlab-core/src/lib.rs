//! ShelterLab Core: panel data, lag features, splits, scaling, metrics, classifier.
//!
//! This crate contains everything a single trial needs:
//! - Panel table, explicit column schema, CSV/Parquet loader
//! - Majority subgroup labels from population columns
//! - Per-entity lag feature builder with first-difference labels
//! - Temporal split and standardization fitted on training rows
//! - F-beta metrics and precision/recall curves
//! - `Trainer` / `Classifier` seam with a gradient-boosted tree implementation

pub mod data;
pub mod features;
pub mod majority;
pub mod matrix;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod panel;
pub mod params;
pub mod rng;
pub mod schema;
pub mod split;

pub use features::{build_lagged, lagged_feature_names, FeatureError, LaggedFrame};
pub use majority::{membership_columns, MajorityError, SubgroupDimension};
pub use matrix::{FeatureMatrix, MatrixError};
pub use metrics::{fbeta_score, precision_recall_curve, ScoreSet};
pub use model::{BoostedTrees, BoostedTreesTrainer, Classifier, ModelError, Trainer};
pub use normalize::{NormalizeError, StandardScaler};
pub use panel::{EntityId, PanelError, PanelTable, Period};
pub use params::{HyperParams, ParamKey};
pub use rng::RngHierarchy;
pub use schema::{PanelSchema, SchemaError};
pub use split::{split_at, TemporalSplit};
