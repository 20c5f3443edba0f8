//! In-memory row table: ordered row ids plus named columns.
//!
//! Columns are stored column-major. A column is `Numeric` when every cell
//! parsed as a real number at load time, otherwise it keeps the raw text so
//! that a later numeric request can report the offending cell.

use std::borrow::Cow;
use std::collections::HashMap;

use ncl_common::{NclError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct RowTable {
    ids: Vec<String>,
    names: Vec<String>,
    columns: Vec<ColumnData>,
    index: HashMap<String, usize>,
}

impl RowTable {
    /// Empty table (no columns) over the given row ids.
    pub fn new(ids: Vec<String>) -> Self {
        Self {
            ids,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    /// Numeric view of a column.
    ///
    /// Text columns are parsed on the fly; the first cell that is not a
    /// real number yields `NonNumeric`.
    pub fn numeric_column(&self, name: &str) -> Result<Cow<'_, [f64]>> {
        match self.column(name) {
            None => Err(NclError::MissingColumn(name.to_string())),
            Some(ColumnData::Numeric(values)) => Ok(Cow::Borrowed(values.as_slice())),
            Some(ColumnData::Text(cells)) => {
                let mut parsed = Vec::with_capacity(cells.len());
                for (row, cell) in cells.iter().enumerate() {
                    match cell.trim().parse::<f64>() {
                        Ok(v) => parsed.push(v),
                        Err(_) => {
                            return Err(NclError::NonNumeric {
                                column: name.to_string(),
                                row_id: self.ids[row].clone(),
                                value: cell.clone(),
                            })
                        }
                    }
                }
                Ok(Cow::Owned(parsed))
            }
        }
    }

    /// String keys of a column, used for era partitioning.
    pub fn key_column(&self, name: &str) -> Result<Vec<String>> {
        match self.column(name) {
            None => Err(NclError::MissingColumn(name.to_string())),
            Some(ColumnData::Text(cells)) => Ok(cells.clone()),
            Some(ColumnData::Numeric(values)) => {
                Ok(values.iter().map(|v| v.to_string()).collect())
            }
        }
    }

    /// Append a new column. Fails on a duplicate name or wrong row count.
    pub fn push_column(&mut self, name: impl Into<String>, data: ColumnData) -> Result<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(NclError::DuplicateColumn(name));
        }
        self.check_len(&name, &data)?;
        self.index.insert(name.clone(), self.columns.len());
        self.names.push(name);
        self.columns.push(data);
        Ok(())
    }

    /// Insert or overwrite a numeric column, like `df[name] = values`.
    pub fn add_numeric_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        let data = ColumnData::Numeric(values);
        self.check_len(&name, &data)?;
        match self.index.get(&name) {
            Some(&i) => self.columns[i] = data,
            None => {
                self.index.insert(name.clone(), self.columns.len());
                self.names.push(name);
                self.columns.push(data);
            }
        }
        Ok(())
    }

    /// New table with only the named columns, in the requested order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<RowTable> {
        let mut out = RowTable::new(self.ids.clone());
        for name in names {
            let name = name.as_ref();
            let data = self
                .column(name)
                .ok_or_else(|| NclError::MissingColumn(name.to_string()))?;
            out.push_column(name, data.clone())?;
        }
        Ok(out)
    }

    /// New table with only the given rows, in the given order.
    /// Panics if a row index is out of range.
    pub fn take_rows(&self, rows: &[usize]) -> RowTable {
        let columns = self
            .columns
            .iter()
            .map(|col| match col {
                ColumnData::Numeric(v) => ColumnData::Numeric(rows.iter().map(|&r| v[r]).collect()),
                ColumnData::Text(v) => ColumnData::Text(rows.iter().map(|&r| v[r].clone()).collect()),
            })
            .collect();
        RowTable {
            ids: rows.iter().map(|&r| self.ids[r].clone()).collect(),
            names: self.names.clone(),
            columns,
            index: self.index.clone(),
        }
    }

    fn check_len(&self, name: &str, data: &ColumnData) -> Result<()> {
        if data.len() != self.ids.len() {
            return Err(NclError::LengthMismatch {
                column: name.to_string(),
                expected: self.ids.len(),
                actual: data.len(),
            });
        }
        Ok(())
    }
}

/// Incremental table construction; validation happens in `build`.
#[derive(Debug, Clone, Default)]
pub struct TableBuilder {
    ids: Vec<String>,
    columns: Vec<(String, ColumnData)>,
}

impl TableBuilder {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            columns: Vec::new(),
        }
    }

    /// Ids "0".."n-1", matching a default positional index.
    pub fn positional(n: usize) -> Self {
        Self::new((0..n).map(|i| i.to_string()))
    }

    pub fn numeric(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.columns.push((name.into(), ColumnData::Numeric(values)));
        self
    }

    pub fn text<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.columns.push((name.into(), ColumnData::Text(values)));
        self
    }

    pub fn column(mut self, name: impl Into<String>, data: ColumnData) -> Self {
        self.columns.push((name.into(), data));
        self
    }

    pub fn build(self) -> Result<RowTable> {
        let mut table = RowTable::new(self.ids);
        for (name, data) in self.columns {
            table.push_column(name, data)?;
        }
        Ok(table)
    }
}
