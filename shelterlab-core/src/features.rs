//! Lag feature construction: turns a panel into per-entity lagged rows and
//! binary "target increased" labels.
//!
//! For lag depth `L`, a row for entity `e` at period `t` carries every base
//! feature at periods `t, t-1, ..., t-L`. The row exists only when all those
//! values are present, and it is labelled only when the previous period
//! `t-1` also has a complete lagged row; the label is `1` iff the target
//! strictly increased from `t-1` to `t`. Lags are matched by period, never by
//! position, so a missing year cannot pull in an older one.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use thiserror::Error;

use crate::matrix::{FeatureMatrix, MatrixError};
use crate::panel::{EntityId, PanelError, PanelTable, Period};
use crate::schema::{PanelSchema, SchemaError};

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("panel error: {0}")]
    Panel(#[from] PanelError),
    #[error("matrix error: {0}")]
    Matrix(#[from] MatrixError),
}

/// Lagged feature table. Rows are sorted by (period, entity).
#[derive(Debug, Clone, PartialEq)]
pub struct LaggedFrame {
    pub lags: usize,
    pub entity_ids: Vec<EntityId>,
    pub periods: Vec<Period>,
    /// `{feature}_lag_{k}` for every base feature, lags `0..=L`.
    pub feature_names: Vec<String>,
    pub features: FeatureMatrix,
    pub labels: Vec<u8>,
    /// Pass-through categorical columns, row-aligned with `features`.
    pub subgroups: Vec<(String, Vec<String>)>,
}

impl LaggedFrame {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn subgroup(&self, name: &str) -> Option<&[String]> {
        self.subgroups
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// Copy of the listed rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            lags: self.lags,
            entity_ids: indices.iter().map(|&i| self.entity_ids[i]).collect(),
            periods: indices.iter().map(|&i| self.periods[i]).collect(),
            feature_names: self.feature_names.clone(),
            features: self.features.select_rows(indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            subgroups: self
                .subgroups
                .iter()
                .map(|(name, values)| {
                    (
                        name.clone(),
                        indices.iter().map(|&i| values[i].clone()).collect(),
                    )
                })
                .collect(),
        }
    }

    pub fn positive_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }
}

/// Column names produced for a schema at lag depth `lags`.
pub fn lagged_feature_names(schema: &PanelSchema, lags: usize) -> Vec<String> {
    schema
        .features
        .iter()
        .flat_map(|f| (0..=lags).map(move |k| format!("{f}_lag_{k}")))
        .collect()
}

/// Build the lagged feature table for `lags` periods of history.
pub fn build_lagged(
    table: &PanelTable,
    schema: &PanelSchema,
    lags: usize,
) -> Result<LaggedFrame, FeatureError> {
    schema.validate(table)?;

    let columns: Vec<&[f64]> = schema
        .features
        .iter()
        .map(|f| table.require_numeric(f))
        .collect::<Result<_, _>>()?;
    let subgroup_columns: Vec<&[String]> = schema
        .subgroups
        .iter()
        .map(|s| table.require_categorical(s))
        .collect::<Result<_, _>>()?;
    let target = schema.target_index().ok_or_else(|| {
        FeatureError::Schema(SchemaError::TargetNotFeature(schema.target.clone()))
    })?;

    // entity -> (period -> row index)
    let mut by_entity: BTreeMap<EntityId, HashMap<Period, usize>> = BTreeMap::new();
    for (row, (&entity, &period)) in table.entity_ids().iter().zip(table.periods()).enumerate() {
        by_entity.entry(entity).or_default().insert(period, row);
    }

    let row_present = |row: usize| columns.iter().all(|c| !c[row].is_nan());
    let lag_lookup = lags as Period;

    // (period, entity, row at t, row at t-1)
    let mut kept: Vec<(Period, EntityId, usize, usize)> = Vec::new();
    for (&entity, periods) in &by_entity {
        let complete = |t: Period| -> bool {
            (0..=lag_lookup).all(|k| periods.get(&(t - k)).is_some_and(|&r| row_present(r)))
        };
        for (&t, &row) in periods {
            if !complete(t) || !complete(t - 1) {
                continue;
            }
            let prev_row = periods[&(t - 1)];
            kept.push((t, entity, row, prev_row));
        }
    }
    kept.sort_unstable_by_key(|&(p, e, _, _)| (p, e));

    let n_cols = columns.len() * (lags + 1);
    let mut data = Vec::with_capacity(kept.len() * n_cols);
    let mut labels = Vec::with_capacity(kept.len());
    let mut entity_ids = Vec::with_capacity(kept.len());
    let mut out_periods = Vec::with_capacity(kept.len());
    let mut subgroups: Vec<Vec<String>> = vec![Vec::with_capacity(kept.len()); subgroup_columns.len()];

    for &(t, entity, row, prev_row) in &kept {
        let periods = &by_entity[&entity];
        for column in &columns {
            for k in 0..=lag_lookup {
                data.push(column[periods[&(t - k)]]);
            }
        }
        let current = columns[target][row];
        let previous = columns[target][prev_row];
        labels.push(u8::from(current - previous > 0.0));
        entity_ids.push(entity);
        out_periods.push(t);
        for (out, source) in subgroups.iter_mut().zip(&subgroup_columns) {
            out.push(source[row].clone());
        }
    }

    debug!(
        "lag builder: {} panel rows -> {} lagged rows at depth {}",
        table.len(),
        labels.len(),
        lags
    );

    Ok(LaggedFrame {
        lags,
        entity_ids,
        periods: out_periods,
        feature_names: lagged_feature_names(schema, lags),
        features: FeatureMatrix::new(labels.len(), n_cols, data)?,
        labels,
        subgroups: schema.subgroups.iter().cloned().zip(subgroups).collect(),
    })
}
