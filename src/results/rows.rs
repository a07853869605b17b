use std::fmt;

use super::column::Column;
use super::decode::{FromRow, FromValue, ScanDest, column_label};
use super::result_set::ResultSet;
use crate::error::DataHelperError;
use crate::types::SqlValue;

/// A backend cursor a [`Rows`] drives.
///
/// Each driver supplies its own implementation; `Rows` layers the cursor discipline
/// (positioning, deferred errors, idempotent close) on top.
pub trait RowCursor: Send {
    /// Column descriptors, in select-list order.
    fn columns(&self) -> &[Column];

    /// Read the next record, `Ok(None)` once exhausted.
    ///
    /// # Errors
    /// Returns the driver error that interrupted iteration.
    fn advance(&mut self) -> Result<Option<Vec<SqlValue>>, DataHelperError>;

    /// Release driver resources. Called at most once.
    fn close(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Pending,
    Positioned,
    Exhausted,
    Closed,
}

/// Forward-only, single-pass cursor over a query result.
///
/// ```rust
/// use datahelper_lite::prelude::*;
///
/// let mut rs = ResultSet::default();
/// rs.set_columns(vec![Column::new("id", "INTEGER", ScanType::Int)]);
/// rs.add_row_values(vec![SqlValue::Int(7)])?;
///
/// let mut rows = Rows::from(rs);
/// let mut id = 0_i64;
/// while rows.next() {
///     rows.scan(&mut [&mut id])?;
/// }
/// assert!(rows.err().is_none());
/// assert_eq!(id, 7);
/// rows.close();
/// # Ok::<(), DataHelperError>(())
/// ```
pub struct Rows {
    cursor: Box<dyn RowCursor>,
    columns: Vec<Column>,
    current: Option<Vec<SqlValue>>,
    state: CursorState,
    err: Option<DataHelperError>,
}

impl Rows {
    #[must_use]
    pub fn new(cursor: Box<dyn RowCursor>) -> Self {
        let columns = cursor.columns().to_vec();
        Self {
            cursor,
            columns,
            current: None,
            state: CursorState::Pending,
            err: None,
        }
    }

    /// Advance to the next record.
    ///
    /// Returns `false` at natural exhaustion (with [`Rows::err`] unset) or when advancing
    /// failed (with [`Rows::err`] set). A failed or exhausted cursor stays that way.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        if matches!(self.state, CursorState::Exhausted | CursorState::Closed) {
            return false;
        }
        match self.cursor.advance() {
            Ok(Some(values)) => {
                self.current = Some(values);
                self.state = CursorState::Positioned;
                true
            }
            Ok(None) => {
                self.current = None;
                self.state = CursorState::Exhausted;
                false
            }
            Err(err) => {
                tracing::debug!(error = %err, "cursor advance failed");
                self.current = None;
                self.err = Some(err);
                self.state = CursorState::Exhausted;
                false
            }
        }
    }

    /// The error that stopped iteration, if any.
    #[must_use]
    pub fn err(&self) -> Option<&DataHelperError> {
        self.err.as_ref()
    }

    pub(crate) fn take_err(&mut self) -> Option<DataHelperError> {
        self.err.take()
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    fn current(&self) -> Result<&[SqlValue], DataHelperError> {
        match (self.state, &self.current) {
            (CursorState::Closed, _) => Err(DataHelperError::CursorClosed),
            (CursorState::Positioned, Some(values)) => Ok(values),
            _ => Err(DataHelperError::NoCurrentRow),
        }
    }

    /// Decode the current record positionally into `dest`.
    ///
    /// # Errors
    /// `NoCurrentRow` before the first successful [`Rows::next`] or after exhaustion,
    /// `CursorClosed` after [`Rows::close`], `ColumnCountMismatch` when `dest` is not
    /// exactly as wide as the record, and `TypeConversion` naming the offending column.
    pub fn scan(&self, dest: &mut [&mut dyn ScanDest]) -> Result<(), DataHelperError> {
        let values = self.current()?;
        if dest.len() != values.len() {
            return Err(DataHelperError::ColumnCountMismatch {
                columns: values.len(),
                destinations: dest.len(),
            });
        }
        for (idx, (slot, value)) in dest.iter_mut().zip(values).enumerate() {
            slot.scan_from(value)
                .map_err(|m| m.into_error(&column_label(&self.columns, idx)))?;
        }
        Ok(())
    }

    /// Decode one column of the current record.
    ///
    /// # Errors
    /// Same positioning errors as [`Rows::scan`]; `ColumnCountMismatch` for an index past
    /// the last column.
    pub fn get<T: FromValue>(&self, idx: usize) -> Result<T, DataHelperError> {
        let values = self.current()?;
        let value = values
            .get(idx)
            .ok_or(DataHelperError::ColumnCountMismatch {
                columns: values.len(),
                destinations: idx + 1,
            })?;
        T::from_value(value).map_err(|m| m.into_error(&column_label(&self.columns, idx)))
    }

    /// Decode the column called `name` of the current record.
    ///
    /// # Errors
    /// `ExecutionError` when no column has that name, otherwise as [`Rows::get`].
    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T, DataHelperError> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| DataHelperError::ExecutionError(format!("no column named {name}")))?;
        self.get(idx)
    }

    /// Snapshot of the current record, ordered like [`Rows::columns`].
    ///
    /// # Errors
    /// Same positioning errors as [`Rows::scan`].
    pub fn values(&self) -> Result<Vec<SqlValue>, DataHelperError> {
        self.current().map(<[SqlValue]>::to_vec)
    }

    /// Raw byte form of the current record; `None` for NULL columns.
    ///
    /// # Errors
    /// Same positioning errors as [`Rows::scan`].
    pub fn raw_values(&self) -> Result<Vec<Option<Vec<u8>>>, DataHelperError> {
        Ok(self.current()?.iter().map(SqlValue::to_raw_bytes).collect())
    }

    /// Release the cursor. Safe to call repeatedly and before the cursor is drained.
    pub fn close(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        self.cursor.close();
        self.current = None;
        self.state = CursorState::Closed;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    /// Drain the remaining records into `T`, closing the cursor.
    ///
    /// # Errors
    /// The first decode error, or the error that stopped iteration.
    pub fn collect_rows<T: FromRow>(mut self) -> Result<Vec<T>, DataHelperError> {
        let mut out = Vec::new();
        while self.next() {
            let values = self.current()?;
            out.push(T::from_row(&self.columns, values)?);
        }
        if let Some(err) = self.take_err() {
            return Err(err);
        }
        self.close();
        Ok(out)
    }
}

impl From<ResultSet> for Rows {
    fn from(rs: ResultSet) -> Self {
        Rows::new(Box::new(rs.into_cursor()))
    }
}

impl Drop for Rows {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Rows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rows")
            .field("columns", &self.columns)
            .field("state", &self.state)
            .field("err", &self.err)
            .finish_non_exhaustive()
    }
}
