//! In-memory panel table: one row per (entity, period).
//!
//! Numeric columns hold `f64` with `NaN` marking a missing value. Categorical
//! columns hold one string per row (subgroup labels, majority labels).

use std::collections::HashSet;

use thiserror::Error;

/// Entity identifier (ZIP code or any other integer-like key).
pub type EntityId = i64;

/// Time period (a year).
pub type Period = i32;

#[derive(Debug, Error, PartialEq)]
pub enum PanelError {
    #[error("column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
    #[error("duplicate row for entity {entity} in period {period}")]
    DuplicateKey { entity: EntityId, period: Period },
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelTable {
    entity_ids: Vec<EntityId>,
    periods: Vec<Period>,
    numeric: Vec<(String, Vec<f64>)>,
    categorical: Vec<(String, Vec<String>)>,
}

impl PanelTable {
    /// Create a table from its identity columns.
    ///
    /// Fails if an (entity, period) pair appears twice.
    pub fn new(entity_ids: Vec<EntityId>, periods: Vec<Period>) -> Result<Self, PanelError> {
        if entity_ids.len() != periods.len() {
            return Err(PanelError::LengthMismatch {
                column: "period".into(),
                expected: entity_ids.len(),
                actual: periods.len(),
            });
        }
        let mut seen = HashSet::with_capacity(entity_ids.len());
        for (&entity, &period) in entity_ids.iter().zip(&periods) {
            if !seen.insert((entity, period)) {
                return Err(PanelError::DuplicateKey { entity, period });
            }
        }
        Ok(Self {
            entity_ids,
            periods,
            numeric: Vec::new(),
            categorical: Vec::new(),
        })
    }

    pub fn with_numeric(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, PanelError> {
        self.push_numeric(name.into(), values)?;
        Ok(self)
    }

    pub fn with_categorical(
        mut self,
        name: impl Into<String>,
        values: Vec<String>,
    ) -> Result<Self, PanelError> {
        self.push_categorical(name.into(), values)?;
        Ok(self)
    }

    pub fn push_numeric(&mut self, name: String, values: Vec<f64>) -> Result<(), PanelError> {
        self.check_new_column(&name, values.len())?;
        self.numeric.push((name, values));
        Ok(())
    }

    pub fn push_categorical(
        &mut self,
        name: String,
        values: Vec<String>,
    ) -> Result<(), PanelError> {
        self.check_new_column(&name, values.len())?;
        self.categorical.push((name, values));
        Ok(())
    }

    fn check_new_column(&self, name: &str, len: usize) -> Result<(), PanelError> {
        if self.has_column(name) {
            return Err(PanelError::DuplicateColumn(name.to_string()));
        }
        if len != self.len() {
            return Err(PanelError::LengthMismatch {
                column: name.to_string(),
                expected: self.len(),
                actual: len,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entity_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_ids.is_empty()
    }

    pub fn entity_ids(&self) -> &[EntityId] {
        &self.entity_ids
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn max_period(&self) -> Option<Period> {
        self.periods.iter().copied().max()
    }

    pub fn numeric(&self, name: &str) -> Option<&[f64]> {
        self.numeric
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn categorical(&self, name: &str) -> Option<&[String]> {
        self.categorical
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn require_numeric(&self, name: &str) -> Result<&[f64], PanelError> {
        self.numeric(name)
            .ok_or_else(|| PanelError::UnknownColumn(name.to_string()))
    }

    pub fn require_categorical(&self, name: &str) -> Result<&[String], PanelError> {
        self.categorical(name)
            .ok_or_else(|| PanelError::UnknownColumn(name.to_string()))
    }

    /// Numeric column names in insertion order.
    pub fn numeric_columns(&self) -> impl Iterator<Item = &str> {
        self.numeric.iter().map(|(n, _)| n.as_str())
    }

    /// Categorical column names in insertion order.
    pub fn categorical_columns(&self) -> impl Iterator<Item = &str> {
        self.categorical.iter().map(|(n, _)| n.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.numeric(name).is_some() || self.categorical(name).is_some()
    }

    /// Number of distinct entities.
    pub fn entity_count(&self) -> usize {
        self.entity_ids.iter().collect::<HashSet<_>>().len()
    }

    /// Number of distinct periods.
    pub fn period_count(&self) -> usize {
        self.periods.iter().collect::<HashSet<_>>().len()
    }
}
