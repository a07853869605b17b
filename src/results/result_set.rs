use std::collections::VecDeque;
use std::sync::Arc;

use super::column::{Column, ScanType};
use super::rows::RowCursor;
use crate::error::DataHelperError;
use crate::types::SqlValue;

/// A fully materialised query result.
///
/// Drivers that read every record eagerly (the `SQLite` and Postgres drivers both do)
/// build one of these and hand it to [`Rows`](super::Rows) through [`BufferedCursor`].
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Arc<Vec<Column>>,
    rows: Vec<Vec<SqlValue>>,
    /// Rows affected by a DML statement; zero for plain queries.
    pub rows_affected: u64,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            columns: Arc::new(Vec::new()),
            rows: Vec::with_capacity(capacity),
            rows_affected: 0,
        }
    }

    /// Set the column descriptors shared by all rows.
    pub fn set_columns(&mut self, columns: Vec<Column>) {
        self.columns = Arc::new(columns);
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Append one record.
    ///
    /// # Errors
    /// Returns `ColumnCountMismatch` when the record width differs from the column count.
    pub fn add_row_values(&mut self, row_values: Vec<SqlValue>) -> Result<(), DataHelperError> {
        if row_values.len() != self.columns.len() {
            return Err(DataHelperError::ColumnCountMismatch {
                columns: self.columns.len(),
                destinations: row_values.len(),
            });
        }
        self.rows.push(row_values);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<SqlValue>] {
        &self.rows
    }

    /// Fill in `Unknown` scan types from the first non-null value of each column.
    pub fn refine_scan_types(&mut self) {
        if self
            .columns
            .iter()
            .all(|c| c.scan_type() != ScanType::Unknown)
        {
            return;
        }
        let columns = Arc::make_mut(&mut self.columns);
        for (idx, column) in columns.iter_mut().enumerate() {
            if let Some(value) = self
                .rows
                .iter()
                .filter_map(|row| row.get(idx))
                .find(|v| !v.is_null())
            {
                column.refine_scan_type(ScanType::of(value));
            }
        }
    }

    #[must_use]
    pub fn into_cursor(self) -> BufferedCursor {
        BufferedCursor {
            columns: self.columns,
            rows: self.rows.into(),
        }
    }
}

/// A [`RowCursor`] over rows already read into memory.
#[derive(Debug)]
pub struct BufferedCursor {
    columns: Arc<Vec<Column>>,
    rows: VecDeque<Vec<SqlValue>>,
}

impl RowCursor for BufferedCursor {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn advance(&mut self) -> Result<Option<Vec<SqlValue>>, DataHelperError> {
        Ok(self.rows.pop_front())
    }

    fn close(&mut self) {
        self.rows.clear();
    }
}
