//! Panel preparation: load, resolve subgroup labels, resolve the schema.

use std::path::Path;

use log::info;
use shelterlab_core::data::{DataError, PanelLoader};
use shelterlab_core::{
    membership_columns, MajorityError, PanelSchema, PanelTable, SchemaError,
};
use thiserror::Error;

use crate::config::ShelterConfig;

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Majority(#[from] MajorityError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// A panel ready for the search: subgroup label columns resolved, schema validated.
#[derive(Debug, Clone)]
pub struct PreparedPanel {
    pub table: PanelTable,
    pub schema: PanelSchema,
    /// Categorical column holding each configured dimension's labels,
    /// in configuration order.
    pub dimension_columns: Vec<(String, String)>,
}

pub fn load_panel(path: &Path, config: &ShelterConfig) -> Result<PreparedPanel, PrepareError> {
    let table = PanelLoader::new(&config.schema.entity_column, &config.schema.period_column)
        .with_categorical(config.schema.categorical.clone())
        .load(path)?;
    prepare_panel(table, config)
}

/// Resolve one label column per dimension, then build the schema.
///
/// A dimension whose label column is already in the panel uses it as is;
/// otherwise the majority labels are derived from its population columns.
///
/// With no explicit feature list, every numeric column becomes a feature
/// except the configured exclusions and any column naming a dimension member.
pub fn prepare_panel(
    mut table: PanelTable,
    config: &ShelterConfig,
) -> Result<PreparedPanel, PrepareError> {
    let dimensions = &config.calibration.dimensions;
    let mut dimension_columns = Vec::with_capacity(dimensions.len());
    for dim in dimensions {
        let (column, derived) = dim.resolve(&mut table)?;
        if derived {
            info!("dimension '{}': derived majority labels into '{column}'", dim.name);
        } else {
            info!("dimension '{}': using panel column '{column}'", dim.name);
        }
        dimension_columns.push((dim.name.clone(), column));
    }
    let subgroups: Vec<String> = dimension_columns.iter().map(|(_, c)| c.clone()).collect();

    let cfg = &config.schema;
    let schema = if cfg.features.is_empty() {
        let mut exclude = cfg.exclude.clone();
        exclude.extend(membership_columns(&table, dimensions));
        PanelSchema::infer(
            &cfg.entity_column,
            &cfg.period_column,
            &cfg.target,
            subgroups,
            &exclude,
            &table,
        )?
    } else {
        PanelSchema::new(
            &cfg.entity_column,
            &cfg.period_column,
            &cfg.target,
            cfg.features.clone(),
            subgroups,
            &table,
        )?
    };

    info!(
        "prepared panel: {} rows, {} entities, {} periods, features {:?}",
        table.len(),
        table.entity_count(),
        table.period_count(),
        schema.features
    );
    Ok(PreparedPanel {
        table,
        schema,
        dimension_columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CalibrationConfig, SchemaConfig, SearchConfig};
    use shelterlab_core::SubgroupDimension;

    fn table() -> PanelTable {
        PanelTable::new(vec![1, 1, 2, 2], vec![2020, 2021, 2020, 2021])
            .unwrap()
            .with_numeric("count", vec![1.0, 2.0, 3.0, 1.0])
            .unwrap()
            .with_numeric("income", vec![10.0, 11.0, 12.0, 13.0])
            .unwrap()
            .with_numeric("population_male", vec![5.0, 5.0, 1.0, 1.0])
            .unwrap()
            .with_numeric("population_female", vec![4.0, 6.0, 2.0, 1.0])
            .unwrap()
    }

    fn config(features: Vec<String>, exclude: Vec<String>) -> ShelterConfig {
        ShelterConfig {
            schema: SchemaConfig {
                entity_column: "zip".into(),
                period_column: "year".into(),
                target: "count".into(),
                features,
                exclude,
                categorical: vec![],
            },
            search: SearchConfig::default(),
            calibration: CalibrationConfig {
                beta: 2.0,
                dimensions: vec![SubgroupDimension::new(
                    "gender",
                    vec!["male".into(), "female".into()],
                )],
            },
        }
    }

    #[test]
    fn inferred_features_skip_membership_columns() {
        let prepared = prepare_panel(table(), &config(vec![], vec![])).unwrap();
        assert_eq!(prepared.schema.features, vec!["count", "income"]);
        assert_eq!(prepared.schema.subgroups, vec!["gender_majority"]);
        assert_eq!(
            prepared.table.categorical("gender_majority").unwrap(),
            ["male", "female", "female", "male"]
        );
    }

    #[test]
    fn exclusions_apply() {
        let prepared = prepare_panel(table(), &config(vec![], vec!["income".into()])).unwrap();
        assert_eq!(prepared.schema.features, vec!["count"]);
    }

    #[test]
    fn explicit_features_win() {
        let prepared = prepare_panel(table(), &config(vec!["count".into()], vec![])).unwrap();
        assert_eq!(prepared.schema.features, vec!["count"]);
        assert_eq!(
            prepared.dimension_columns,
            vec![("gender".to_string(), "gender_majority".to_string())]
        );
    }

    #[test]
    fn pre_labelled_panel_passes_through() {
        let labelled = PanelTable::new(vec![1, 1, 2, 2], vec![2020, 2021, 2020, 2021])
            .unwrap()
            .with_numeric("count", vec![1.0, 2.0, 3.0, 1.0])
            .unwrap()
            .with_numeric("income", vec![10.0, 11.0, 12.0, 13.0])
            .unwrap()
            .with_categorical(
                "gender_majority",
                vec!["male".into(), "female".into(), "female".into(), "female".into()],
            )
            .unwrap();
        let prepared = prepare_panel(labelled, &config(vec![], vec![])).unwrap();
        assert_eq!(prepared.schema.features, vec!["count", "income"]);
        assert_eq!(prepared.schema.subgroups, vec!["gender_majority"]);
        assert_eq!(
            prepared.table.categorical("gender_majority").unwrap(),
            ["male", "female", "female", "female"]
        );
    }

    #[test]
    fn explicit_label_column_is_used() {
        let labelled = PanelTable::new(vec![1, 2], vec![2020, 2020])
            .unwrap()
            .with_numeric("count", vec![1.0, 2.0])
            .unwrap()
            .with_categorical("sex", vec!["male".into(), "female".into()])
            .unwrap();
        let mut cfg = config(vec![], vec![]);
        cfg.calibration.dimensions = vec![SubgroupDimension::from_column("gender", "sex")];
        let prepared = prepare_panel(labelled, &cfg).unwrap();
        assert_eq!(
            prepared.dimension_columns,
            vec![("gender".to_string(), "sex".to_string())]
        );
        assert_eq!(prepared.schema.subgroups, vec!["sex"]);
    }

    #[test]
    fn missing_population_column_fails() {
        let mut cfg = config(vec![], vec![]);
        cfg.calibration.dimensions[0].members.push("other".into());
        assert!(matches!(
            prepare_panel(table(), &cfg),
            Err(PrepareError::Majority(_))
        ));
    }
}
