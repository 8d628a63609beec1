//! Panel schema contract: which columns are identity, which are lag-able
//! features, and which are subgroup labels that pass through unchanged.
//!
//! The schema is explicit: the feature builder never guesses a column's role
//! from its name. `PanelSchema::infer` is a convenience for callers that want
//! "every numeric column not claimed by another role" as the feature set.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::panel::PanelTable;

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("feature column '{0}' is not a numeric column of the panel")]
    UnknownFeature(String),
    #[error("subgroup column '{0}' is not a categorical column of the panel")]
    UnknownSubgroup(String),
    #[error("target '{0}' is not one of the base features")]
    TargetNotFeature(String),
    #[error("column '{0}' is listed in more than one role")]
    ConflictingRole(String),
    #[error("schema has no base features")]
    NoFeatures,
}

/// Validated column roles for a panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSchema {
    pub entity_column: String,
    pub period_column: String,
    /// Feature whose first difference defines the label.
    pub target: String,
    /// Lag-able base features, in output order.
    pub features: Vec<String>,
    /// Categorical columns carried through row-aligned.
    pub subgroups: Vec<String>,
}

impl PanelSchema {
    /// Build a schema from explicit roles and validate it against `table`.
    pub fn new(
        entity_column: impl Into<String>,
        period_column: impl Into<String>,
        target: impl Into<String>,
        features: Vec<String>,
        subgroups: Vec<String>,
        table: &PanelTable,
    ) -> Result<Self, SchemaError> {
        let schema = Self {
            entity_column: entity_column.into(),
            period_column: period_column.into(),
            target: target.into(),
            features,
            subgroups,
        };
        schema.validate(table)?;
        Ok(schema)
    }

    /// Use every numeric column of `table` except those in `exclude` as a feature.
    pub fn infer(
        entity_column: impl Into<String>,
        period_column: impl Into<String>,
        target: impl Into<String>,
        subgroups: Vec<String>,
        exclude: &[String],
        table: &PanelTable,
    ) -> Result<Self, SchemaError> {
        let features = table
            .numeric_columns()
            .filter(|c| !exclude.iter().any(|e| e == c))
            .map(str::to_string)
            .collect();
        Self::new(
            entity_column,
            period_column,
            target,
            features,
            subgroups,
            table,
        )
    }

    /// Check the schema against a concrete table.
    pub fn validate(&self, table: &PanelTable) -> Result<(), SchemaError> {
        if self.features.is_empty() {
            return Err(SchemaError::NoFeatures);
        }

        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(self.entity_column.as_str());
        if !seen.insert(self.period_column.as_str()) {
            return Err(SchemaError::ConflictingRole(self.period_column.clone()));
        }
        for name in self.features.iter().chain(&self.subgroups) {
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::ConflictingRole(name.clone()));
            }
        }

        for feature in &self.features {
            if table.numeric(feature).is_none() {
                return Err(SchemaError::UnknownFeature(feature.clone()));
            }
        }
        for subgroup in &self.subgroups {
            if table.categorical(subgroup).is_none() {
                return Err(SchemaError::UnknownSubgroup(subgroup.clone()));
            }
        }
        if !self.features.contains(&self.target) {
            return Err(SchemaError::TargetNotFeature(self.target.clone()));
        }
        Ok(())
    }

    pub fn target_index(&self) -> Option<usize> {
        self.features.iter().position(|f| *f == self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PanelTable {
        PanelTable::new(vec![1, 1], vec![2020, 2021])
            .unwrap()
            .with_numeric("count", vec![1.0, 2.0])
            .unwrap()
            .with_numeric("income", vec![10.0, 11.0])
            .unwrap()
            .with_numeric("population_male", vec![5.0, 6.0])
            .unwrap()
            .with_categorical("gender_majority", vec!["male".into(), "male".into()])
            .unwrap()
    }

    #[test]
    fn explicit_schema_validates() {
        let schema = PanelSchema::new(
            "zip_code",
            "year",
            "count",
            vec!["count".into(), "income".into()],
            vec!["gender_majority".into()],
            &table(),
        )
        .unwrap();
        assert_eq!(schema.target_index(), Some(0));
    }

    #[test]
    fn infer_respects_exclusions() {
        let schema = PanelSchema::infer(
            "zip_code",
            "year",
            "count",
            vec!["gender_majority".into()],
            &["population_male".into()],
            &table(),
        )
        .unwrap();
        assert_eq!(schema.features, vec!["count", "income"]);
    }

    #[test]
    fn unknown_feature_rejected() {
        let err = PanelSchema::new(
            "zip_code",
            "year",
            "count",
            vec!["count".into(), "rent".into()],
            vec![],
            &table(),
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::UnknownFeature("rent".into()));
    }

    #[test]
    fn subgroup_must_be_categorical() {
        let err = PanelSchema::new(
            "zip_code",
            "year",
            "count",
            vec!["count".into()],
            vec!["income".into()],
            &table(),
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::UnknownSubgroup("income".into()));
    }

    #[test]
    fn target_must_be_feature() {
        let err = PanelSchema::new(
            "zip_code",
            "year",
            "count",
            vec!["income".into()],
            vec![],
            &table(),
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::TargetNotFeature("count".into()));
    }

    #[test]
    fn column_in_two_roles_rejected() {
        let err = PanelSchema::new(
            "zip_code",
            "year",
            "count",
            vec!["count".into(), "count".into()],
            vec![],
            &table(),
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::ConflictingRole("count".into()));
    }

    #[test]
    fn empty_features_rejected() {
        let err = PanelSchema::new("zip_code", "year", "count", vec![], vec![], &table())
            .unwrap_err();
        assert_eq!(err, SchemaError::NoFeatures);
    }
}
