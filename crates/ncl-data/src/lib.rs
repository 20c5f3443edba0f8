//! File-backed collaborators for the submission pipeline.
//!
//! - `csv_loader`: live/training tables from CSV, with column projection
//! - `feature_metadata`: named feature sets from `features.json`
//! - `predictions`: where model predictions come from (`PredictionSource`)
//! - `submission`: the `id,prediction` CSV handed to the tournament
//!
//! # Example
//!
//! ```rust,no_run
//! use ncl_data::{load_table, FeatureMetadata, TableSchema};
//!
//! fn main() -> ncl_common::Result<()> {
//!     let dir = ncl_data::default_data_dir();
//!     let metadata = FeatureMetadata::from_path(dir.join("features.json"))?;
//!     let mut columns = metadata.feature_set("small")?.to_vec();
//!     columns.push("era".to_string());
//!
//!     let schema = TableSchema::new()
//!         .with_id_column("id")
//!         .with_text_columns(["era"])
//!         .with_columns(columns);
//!     let live = load_table(dir.join("live.csv"), &schema)?;
//!     println!("{} live rows", live.len());
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

pub mod csv_loader;
pub mod feature_metadata;
pub mod predictions;
pub mod submission;

pub use csv_loader::{load_table, TableSchema};
pub use feature_metadata::FeatureMetadata;
pub use predictions::{ColumnPredictions, CsvPredictions, PredictionSource, StaticPredictions};
pub use submission::write_submission;

/// Default directory for downloaded tournament data.
pub fn default_data_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("ncl")
}
