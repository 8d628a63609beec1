//! Majority subgroup labels derived from population-count columns.
//!
//! A dimension such as `gender` declares its members (`male`, `female`) and a
//! column prefix; the population of member `m` is read from `{prefix}{m}`.
//! Each row is labelled with the member whose population is largest, and the
//! label is attached to the panel as the categorical column `{name}_majority`.
//!
//! Panels that already carry a categorical label column for a dimension keep
//! it as is; nothing is derived for them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::panel::{EntityId, PanelError, PanelTable, Period};

#[derive(Debug, Error, PartialEq)]
pub enum MajorityError {
    #[error("dimension '{0}' has no members")]
    NoMembers(String),
    #[error("dimension '{dimension}': every population is missing for entity {entity} in period {period}")]
    AllMissing {
        dimension: String,
        entity: EntityId,
        period: Period,
    },
    #[error("label column '{column}' is empty for entity {entity} in period {period}")]
    EmptyLabel {
        column: String,
        entity: EntityId,
        period: Period,
    },
    #[error(transparent)]
    Panel(#[from] PanelError),
}

fn default_prefix() -> String {
    "population_".into()
}

/// A subgroup axis and the population columns that define it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgroupDimension {
    pub name: String,
    /// Members in declared order; ties go to the earliest.
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default = "default_prefix")]
    pub population_prefix: String,
    /// Label column to read or create instead of `{name}_majority`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl SubgroupDimension {
    pub fn new(name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            name: name.into(),
            members,
            population_prefix: default_prefix(),
            column: None,
        }
    }

    /// A dimension whose labels already sit in `column`.
    pub fn from_column(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            population_prefix: default_prefix(),
            column: Some(column.into()),
        }
    }

    pub fn population_columns(&self) -> Vec<String> {
        self.members
            .iter()
            .map(|m| format!("{}{}", self.population_prefix, m))
            .collect()
    }

    /// Name of the label column.
    pub fn label_column(&self) -> String {
        self.column
            .clone()
            .unwrap_or_else(|| format!("{}_majority", self.name))
    }

    /// Majority member per row.
    pub fn labels(&self, table: &PanelTable) -> Result<Vec<String>, MajorityError> {
        if self.members.is_empty() {
            return Err(MajorityError::NoMembers(self.name.clone()));
        }
        let columns = self
            .population_columns()
            .iter()
            .map(|c| table.require_numeric(c))
            .collect::<Result<Vec<_>, _>>()?;

        (0..table.len())
            .map(|row| {
                let mut best: Option<(usize, f64)> = None;
                for (m, column) in columns.iter().enumerate() {
                    let v = column[row];
                    if v.is_nan() {
                        continue;
                    }
                    if best.map_or(true, |(_, b)| v > b) {
                        best = Some((m, v));
                    }
                }
                best.map(|(m, _)| self.members[m].clone())
                    .ok_or_else(|| MajorityError::AllMissing {
                        dimension: self.name.clone(),
                        entity: table.entity_ids()[row],
                        period: table.periods()[row],
                    })
            })
            .collect()
    }

    /// Compute the labels and attach them as a categorical column.
    pub fn attach(&self, table: &mut PanelTable) -> Result<String, MajorityError> {
        let labels = self.labels(table)?;
        let column = self.label_column();
        table.push_categorical(column.clone(), labels)?;
        Ok(column)
    }

    /// Use the panel's own label column when present, otherwise derive it.
    ///
    /// Returns the column name and whether it was derived.
    pub fn resolve(&self, table: &mut PanelTable) -> Result<(String, bool), MajorityError> {
        let column = self.label_column();
        if let Some(labels) = table.categorical(&column) {
            if let Some(row) = labels.iter().position(|l| l.is_empty()) {
                return Err(MajorityError::EmptyLabel {
                    column,
                    entity: table.entity_ids()[row],
                    period: table.periods()[row],
                });
            }
            return Ok((column, false));
        }
        self.attach(table).map(|c| (c, true))
    }
}

/// Numeric columns that encode subgroup membership and must stay out of the
/// features: any column whose name ends with a member of any dimension.
pub fn membership_columns(table: &PanelTable, dimensions: &[SubgroupDimension]) -> Vec<String> {
    table
        .numeric_columns()
        .filter(|column| {
            dimensions
                .iter()
                .flat_map(|d| &d.members)
                .any(|member| column.ends_with(member.as_str()))
        })
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PanelTable {
        PanelTable::new(vec![1, 2, 3], vec![2020, 2020, 2020])
            .unwrap()
            .with_numeric("population_male", vec![10.0, 4.0, 7.0])
            .unwrap()
            .with_numeric("population_female", vec![8.0, 9.0, 7.0])
            .unwrap()
            .with_numeric("income_female", vec![1.0, 1.0, 1.0])
            .unwrap()
            .with_numeric("count", vec![1.0, 2.0, 3.0])
            .unwrap()
    }

    fn gender() -> SubgroupDimension {
        SubgroupDimension::new("gender", vec!["male".into(), "female".into()])
    }

    #[test]
    fn picks_largest_population() {
        let labels = gender().labels(&table()).unwrap();
        assert_eq!(labels[0], "male");
        assert_eq!(labels[1], "female");
    }

    #[test]
    fn tie_goes_to_first_declared_member() {
        assert_eq!(gender().labels(&table()).unwrap()[2], "male");
    }

    #[test]
    fn missing_population_is_ignored() {
        let t = PanelTable::new(vec![1], vec![2020])
            .unwrap()
            .with_numeric("population_male", vec![f64::NAN])
            .unwrap()
            .with_numeric("population_female", vec![1.0])
            .unwrap();
        assert_eq!(gender().labels(&t).unwrap(), vec!["female".to_string()]);
    }

    #[test]
    fn all_missing_is_an_error() {
        let t = PanelTable::new(vec![5], vec![2019])
            .unwrap()
            .with_numeric("population_male", vec![f64::NAN])
            .unwrap()
            .with_numeric("population_female", vec![f64::NAN])
            .unwrap();
        assert_eq!(
            gender().labels(&t),
            Err(MajorityError::AllMissing {
                dimension: "gender".into(),
                entity: 5,
                period: 2019
            })
        );
    }

    #[test]
    fn missing_population_column_is_an_error() {
        let dim = SubgroupDimension::new("age", vec!["age_below_24".into()]);
        assert!(matches!(
            dim.labels(&table()),
            Err(MajorityError::Panel(PanelError::UnknownColumn(_)))
        ));
    }

    #[test]
    fn attach_adds_categorical_column() {
        let mut t = table();
        let column = gender().attach(&mut t).unwrap();
        assert_eq!(column, "gender_majority");
        assert_eq!(t.categorical("gender_majority").unwrap().len(), 3);
    }

    #[test]
    fn existing_label_column_is_kept() {
        let mut t = PanelTable::new(vec![1, 2], vec![2020, 2020])
            .unwrap()
            .with_categorical("gender_majority", vec!["female".into(), "male".into()])
            .unwrap();
        let (column, derived) = gender().resolve(&mut t).unwrap();
        assert_eq!(column, "gender_majority");
        assert!(!derived);
        assert_eq!(t.categorical("gender_majority").unwrap(), ["female", "male"]);
    }

    #[test]
    fn empty_existing_label_is_an_error() {
        let mut t = PanelTable::new(vec![1, 2], vec![2020, 2020])
            .unwrap()
            .with_categorical("gender_majority", vec!["male".into(), String::new()])
            .unwrap();
        assert_eq!(
            gender().resolve(&mut t),
            Err(MajorityError::EmptyLabel {
                column: "gender_majority".into(),
                entity: 2,
                period: 2020
            })
        );
    }

    #[test]
    fn explicit_column_names_the_labels() {
        let mut t = PanelTable::new(vec![1], vec![2020])
            .unwrap()
            .with_categorical("sex", vec!["female".into()])
            .unwrap();
        let dim = SubgroupDimension::from_column("gender", "sex");
        assert_eq!(dim.resolve(&mut t).unwrap(), ("sex".to_string(), false));
    }

    #[test]
    fn resolve_derives_when_absent() {
        let mut t = table();
        let (column, derived) = gender().resolve(&mut t).unwrap();
        assert_eq!(column, "gender_majority");
        assert!(derived);
    }

    #[test]
    fn membership_columns_match_member_suffixes() {
        let cols = membership_columns(&table(), &[gender()]);
        assert_eq!(
            cols,
            vec!["population_male", "population_female", "income_female"]
        );
    }
}
