//! Panel ingestion (CSV / Parquet)

pub mod ingest;

pub use ingest::{panel_to_dataframe, write_parquet, DataError, PanelLoader};
