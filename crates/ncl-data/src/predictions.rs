//! Where model predictions come from.
//!
//! The neutralizer only needs one score per live row. The trait keeps the
//! submission pipeline independent of how that score was produced.

use std::collections::HashMap;
use std::path::PathBuf;

use ncl_common::{NclError, Result};
use ncl_neutralizer::RowTable;
use tracing::debug;

use crate::csv_loader::{load_table, TableSchema};

/// Source of one prediction per row of a live table.
///
/// Implementations can use:
/// - a column already present in the live table
/// - a CSV written by an external model run, joined on row id
/// - fixed data (testing)
pub trait PredictionSource: Send + Sync {
    /// Short label for logs.
    fn describe(&self) -> String;

    /// Columns the live table must carry for this source to work.
    fn required_columns(&self) -> Vec<String> {
        Vec::new()
    }

    /// Predictions aligned with `table.ids()`.
    fn predictions(&self, table: &RowTable) -> Result<Vec<f64>>;
}

fn join_by_id(table: &RowTable, by_id: &HashMap<String, f64>) -> Result<Vec<f64>> {
    table
        .ids()
        .iter()
        .map(|id| {
            by_id
                .get(id)
                .copied()
                .ok_or_else(|| NclError::MissingPrediction(id.clone()))
        })
        .collect()
}

// ── Column already in the table ──────────────────────────────────────────────

pub struct ColumnPredictions {
    column: String,
}

impl ColumnPredictions {
    pub fn new(column: impl Into<String>) -> Self {
        Self { column: column.into() }
    }
}

impl PredictionSource for ColumnPredictions {
    fn describe(&self) -> String {
        format!("column '{}'", self.column)
    }

    fn required_columns(&self) -> Vec<String> {
        vec![self.column.clone()]
    }

    fn predictions(&self, table: &RowTable) -> Result<Vec<f64>> {
        Ok(table.numeric_column(&self.column)?.into_owned())
    }
}

// ── External CSV keyed by row id ─────────────────────────────────────────────

pub struct CsvPredictions {
    path: PathBuf,
    id_column: String,
    value_column: String,
}

impl CsvPredictions {
    pub fn new(
        path: impl Into<PathBuf>,
        id_column: impl Into<String>,
        value_column: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            id_column: id_column.into(),
            value_column: value_column.into(),
        }
    }
}

impl PredictionSource for CsvPredictions {
    fn describe(&self) -> String {
        format!("{} ({})", self.path.display(), self.value_column)
    }

    fn predictions(&self, table: &RowTable) -> Result<Vec<f64>> {
        let schema = TableSchema::new()
            .with_id_column(self.id_column.as_str())
            .with_columns([self.value_column.as_str()]);
        let preds = load_table(&self.path, &schema)?;
        let values = preds.numeric_column(&self.value_column)?;

        let by_id: HashMap<String, f64> = preds
            .ids()
            .iter()
            .cloned()
            .zip(values.iter().copied())
            .collect();
        debug!(
            "Joining {} external predictions onto {} rows",
            by_id.len(),
            table.len()
        );
        join_by_id(table, &by_id)
    }
}

// ── Fixed predictions for tests ──────────────────────────────────────────────

/// In-memory id → prediction map.
#[derive(Debug, Clone, Default)]
pub struct StaticPredictions {
    data: HashMap<String, f64>,
}

impl StaticPredictions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, value: f64) -> Self {
        self.data.insert(id.to_string(), value);
        self
    }
}

impl PredictionSource for StaticPredictions {
    fn describe(&self) -> String {
        format!("{} static predictions", self.data.len())
    }

    fn predictions(&self, table: &RowTable) -> Result<Vec<f64>> {
        join_by_id(table, &self.data)
    }
}
