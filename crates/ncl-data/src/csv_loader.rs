//! CSV table loading.
//!
//! A column becomes `Numeric` when every cell parses as `f64` (an empty cell
//! counts as a missing value, i.e. NaN). Anything else is kept as text, and
//! the neutralizer reports the offending cell if it is later used as a score
//! or exposure.

use std::path::Path;

use ncl_common::{NclError, Result};
use ncl_neutralizer::{ColumnData, RowTable};
use tracing::{debug, info};

/// Which columns to read and how to interpret them.
#[derive(Debug, Clone, Default)]
pub struct TableSchema {
    /// Column holding row ids; positional ids ("0", "1", ...) when unset
    pub id_column: Option<String>,
    /// Columns never parsed as numbers (era labels, data type, ...)
    pub text_columns: Vec<String>,
    /// Projection; `None` reads every column
    pub columns: Option<Vec<String>>,
}

impl TableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id_column(mut self, name: impl Into<String>) -> Self {
        self.id_column = Some(name.into());
        self
    }

    pub fn with_text_columns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.text_columns.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_columns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

/// Load a CSV file with a header row into a `RowTable`.
pub fn load_table(path: impl AsRef<Path>, schema: &TableSchema) -> Result<RowTable> {
    let path = path.as_ref();
    debug!("Loading table from {:?}", path);

    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
    let position = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| NclError::MissingColumn(name.to_string()))
    };

    let id_pos = schema.id_column.as_deref().map(&position).transpose()?;

    let wanted: Vec<(String, usize)> = match &schema.columns {
        Some(columns) => {
            let mut wanted: Vec<(String, usize)> = Vec::with_capacity(columns.len());
            for name in columns {
                if Some(name.as_str()) == schema.id_column.as_deref()
                    || wanted.iter().any(|(w, _)| w == name)
                {
                    continue;
                }
                wanted.push((name.clone(), position(name)?));
            }
            wanted
        }
        None => headers
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != id_pos)
            .map(|(i, h)| (h.clone(), i))
            .collect(),
    };

    let mut ids: Vec<String> = Vec::new();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); wanted.len()];

    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let id = match id_pos {
            Some(p) => record.get(p).unwrap_or_default().to_string(),
            None => row.to_string(),
        };
        ids.push(id);
        for (slot, (_, pos)) in wanted.iter().enumerate() {
            cells[slot].push(record.get(*pos).unwrap_or_default().to_string());
        }
    }

    let mut table = RowTable::new(ids);
    for ((name, _), column) in wanted.into_iter().zip(cells) {
        let data = if schema.text_columns.iter().any(|t| *t == name) {
            ColumnData::Text(column)
        } else {
            infer_column(column)
        };
        table.push_column(name, data)?;
    }

    info!(
        "Loaded {} rows x {} columns from {:?}",
        table.len(),
        table.column_names().len(),
        path
    );
    Ok(table)
}

fn parse_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

fn infer_column(cells: Vec<String>) -> ColumnData {
    let parsed: Option<Vec<f64>> = cells.iter().map(|c| parse_cell(c)).collect();
    match parsed {
        Some(values) => ColumnData::Numeric(values),
        None => ColumnData::Text(cells),
    }
}
