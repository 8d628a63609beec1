use polars::prelude::*;
use std::fs;
use std::path::Path;

use crate::panel::{EntityId, PanelError, PanelTable, Period};

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("polars: {0}")]
    Polars(#[from] PolarsError),

    #[error("missing identity column '{0}'")]
    MissingColumn(String),

    #[error("null value in identity column '{column}' at row {row}")]
    NullIdentity { column: String, row: usize },

    #[error("null value in categorical column '{column}' at row {row}")]
    NullCategory { column: String, row: usize },

    #[error("unsupported panel format '{0}' (expected .csv or .parquet)")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Panel(#[from] PanelError),
}

/// Reads a panel from CSV or Parquet into a `PanelTable`.
///
/// The entity column is cast to `i64` and the period column to `i32`. String
/// columns, plus any column named in `categorical`, become categorical; every
/// other column is cast to `f64` with nulls mapped to `NaN`. A null in a
/// declared categorical column is an error; in any other string column it
/// becomes an empty label and is logged.
#[derive(Debug, Clone)]
pub struct PanelLoader {
    entity_column: String,
    period_column: String,
    categorical: Vec<String>,
}

impl PanelLoader {
    pub fn new(entity_column: impl Into<String>, period_column: impl Into<String>) -> Self {
        Self {
            entity_column: entity_column.into(),
            period_column: period_column.into(),
            categorical: Vec::new(),
        }
    }

    pub fn with_categorical(mut self, columns: Vec<String>) -> Self {
        self.categorical = columns;
        self
    }

    /// Load by extension: `.csv` or `.parquet`.
    pub fn load(&self, path: &Path) -> Result<PanelTable, DataError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let df = match ext.as_str() {
            "csv" => self.read_csv(path)?,
            "parquet" | "pq" => self.read_parquet(path)?,
            other => return Err(DataError::UnsupportedFormat(other.to_string())),
        };
        log::info!(
            "loaded {} rows x {} columns from {}",
            df.height(),
            df.width(),
            path.display()
        );
        self.build_table(&df)
    }

    fn read_csv(&self, path: &Path) -> Result<DataFrame, DataError> {
        Ok(LazyCsvReader::new(path)
            .with_has_header(true)
            .finish()?
            .collect()?)
    }

    fn read_parquet(&self, path: &Path) -> Result<DataFrame, DataError> {
        let file = fs::File::open(path).map_err(|source| DataError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(ParquetReader::new(file).finish()?)
    }

    pub fn build_table(&self, df: &DataFrame) -> Result<PanelTable, DataError> {
        let entities = df
            .column(&self.entity_column)
            .map_err(|_| DataError::MissingColumn(self.entity_column.clone()))?
            .cast(&DataType::Int64)?;
        let periods = df
            .column(&self.period_column)
            .map_err(|_| DataError::MissingColumn(self.period_column.clone()))?
            .cast(&DataType::Int32)?;

        let entity_ids = entities
            .i64()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.ok_or_else(|| DataError::NullIdentity {
                    column: self.entity_column.clone(),
                    row,
                })
            })
            .collect::<Result<Vec<EntityId>, _>>()?;
        let periods = periods
            .i32()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.ok_or_else(|| DataError::NullIdentity {
                    column: self.period_column.clone(),
                    row,
                })
            })
            .collect::<Result<Vec<Period>, _>>()?;

        let mut table = PanelTable::new(entity_ids, periods)?;

        for column in df.get_columns() {
            let name = column.name().as_str();
            if name == self.entity_column || name == self.period_column {
                continue;
            }
            let is_categorical = self.categorical.iter().any(|c| c == name)
                || matches!(column.dtype(), DataType::String);
            if is_categorical {
                let declared = self.categorical.iter().any(|c| c == name);
                let cast = column.cast(&DataType::String)?;
                let mut nulls = 0usize;
                let values = cast
                    .str()?
                    .into_iter()
                    .enumerate()
                    .map(|(row, v)| match v {
                        Some(v) => Ok(v.to_string()),
                        None if declared => Err(DataError::NullCategory {
                            column: name.to_string(),
                            row,
                        }),
                        None => {
                            nulls += 1;
                            Ok(String::new())
                        }
                    })
                    .collect::<Result<Vec<String>, _>>()?;
                if nulls > 0 {
                    log::warn!("column '{name}': {nulls} null values read as empty labels");
                }
                table.push_categorical(name.to_string(), values)?;
            } else {
                let cast = column.cast(&DataType::Float64)?;
                let values = cast
                    .f64()?
                    .into_iter()
                    .map(|v| v.unwrap_or(f64::NAN))
                    .collect();
                table.push_numeric(name.to_string(), values)?;
            }
        }
        Ok(table)
    }
}

/// Convert a panel back into a DataFrame (identity columns first).
pub fn panel_to_dataframe(
    table: &PanelTable,
    entity_column: &str,
    period_column: &str,
) -> Result<DataFrame, DataError> {
    let mut columns = vec![
        Column::new(entity_column.into(), table.entity_ids().to_vec()),
        Column::new(period_column.into(), table.periods().to_vec()),
    ];
    for name in table.numeric_columns() {
        let values = table.require_numeric(name)?.to_vec();
        columns.push(Column::new(name.into(), values));
    }
    for name in table.categorical_columns() {
        let values = table.require_categorical(name)?.to_vec();
        columns.push(Column::new(name.into(), values));
    }
    Ok(DataFrame::new(columns)?)
}

/// Write a panel to Parquet.
pub fn write_parquet(
    table: &PanelTable,
    entity_column: &str,
    period_column: &str,
    path: &Path,
) -> Result<(), DataError> {
    let mut df = panel_to_dataframe(table, entity_column, period_column)?;
    let file = fs::File::create(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    ParquetWriter::new(file).finish(&mut df)?;
    Ok(())
}
