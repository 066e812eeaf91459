//! Staging buffer for pending insert rows.
//!
//! Holds the escaped column list and one pre-rendered value tuple per row,
//! plus the default table that a missing table argument falls back to.

use crate::error::{UpsertError, UpsertResult};
use crate::escape::SqlEscaper;
use crate::value::SqlValue;

/// One row of column → value pairs, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing an earlier value for the same column.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.fields.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a row from a JSON object.
    pub fn from_json(value: &serde_json::Value) -> UpsertResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| UpsertError::InvalidValue(format!("expected an object, found {}", value)))?;
        let mut row = Row::new();
        for (column, value) in obj {
            row = row.set(column.as_str(), SqlValue::from_json(value)?);
        }
        Ok(row)
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter().fold(Row::new(), |row, (k, v)| row.set(k, v))
    }
}

/// Transient write state shared by a single database-access context.
#[derive(Debug, Clone, Default)]
pub struct StagingBuffer {
    from: Vec<String>,
    keys: Vec<String>,
    rows: Vec<String>,
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table to the from-list. The first entry is the default table.
    pub fn from(&mut self, table: impl Into<String>) -> &mut Self {
        self.from.push(table.into());
        self
    }

    /// The table an upsert falls back to when none is given.
    pub fn default_table(&self) -> Option<&str> {
        self.from.first().map(String::as_str)
    }

    /// Escaped column names, in insert order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Rendered `(v1,v2,...)` tuples, in staging order.
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Replace the staged rows.
    ///
    /// The first row fixes the column list. Every other row must carry the
    /// same set of columns; its values are reordered to match. Two columns
    /// that escape to the same identifier are a `ColumnMismatch` on row 0.
    pub fn set_insert_batch<E: SqlEscaper + ?Sized>(
        &mut self,
        rows: &[Row],
        escaper: &E,
    ) -> UpsertResult<&mut Self> {
        self.keys.clear();
        self.rows.clear();

        let Some(first) = rows.first() else {
            return Ok(self);
        };
        if first.is_empty() {
            return Err(UpsertError::NoValidData);
        }
        let columns: Vec<&str> = first.columns().collect();
        let keys: Vec<String> = columns.iter().map(|c| escaper.escape_identifier(c)).collect();
        if keys.iter().enumerate().any(|(i, key)| keys[..i].contains(key)) {
            return Err(UpsertError::ColumnMismatch { row: 0 });
        }

        let mut tuples = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(UpsertError::ColumnMismatch { row: index });
            }
            let mut values = Vec::with_capacity(columns.len());
            for column in &columns {
                let value = row
                    .get(column)
                    .ok_or(UpsertError::ColumnMismatch { row: index })?;
                values.push(escaper.escape_value(value));
            }
            tuples.push(format!("({})", values.join(",")));
        }

        self.keys = keys;
        self.rows = tuples;
        tracing::trace!(columns = self.keys.len(), rows = self.rows.len(), "staged insert batch");
        Ok(self)
    }

    /// Clear staged columns, rows and the from-list.
    pub fn reset_write(&mut self) {
        self.from.clear();
        self.keys.clear();
        self.rows.clear();
    }
}
