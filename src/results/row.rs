use super::column::Column;
use super::decode::{FromRow, ScanDest};
use super::rows::Rows;
use crate::error::{DataHelperError, NoRowsSentinel};

/// The result of a query expected to return at most one record.
///
/// Query errors are deferred: they surface from [`Row::scan`] or [`Row::get`] rather
/// than from the call that produced the `Row`.
#[derive(Debug)]
pub struct Row {
    rows: Result<Rows, DataHelperError>,
    no_rows: NoRowsSentinel,
}

impl Row {
    pub(crate) fn new(rows: Result<Rows, DataHelperError>, no_rows: NoRowsSentinel) -> Self {
        Self { rows, no_rows }
    }

    /// Column descriptors, or `None` when the query itself failed.
    #[must_use]
    pub fn columns(&self) -> Option<&[Column]> {
        self.rows.as_ref().ok().map(Rows::columns)
    }

    /// The deferred query error, if any.
    #[must_use]
    pub fn err(&self) -> Option<&DataHelperError> {
        self.rows.as_ref().err()
    }

    fn first(self) -> Result<Rows, DataHelperError> {
        let mut rows = self.rows?;
        if rows.next() {
            return Ok(rows);
        }
        Err(rows
            .take_err()
            .unwrap_or(DataHelperError::NoRows(self.no_rows)))
    }

    /// Decode the record into `dest`.
    ///
    /// # Errors
    /// The deferred query error, the configured "no rows" sentinel when the query found
    /// nothing, or any error from [`Rows::scan`].
    pub fn scan(self, dest: &mut [&mut dyn ScanDest]) -> Result<(), DataHelperError> {
        let mut rows = self.first()?;
        let scanned = rows.scan(dest);
        rows.close();
        scanned
    }

    /// Decode the record into `T`.
    ///
    /// # Errors
    /// As [`Row::scan`].
    pub fn get<T: FromRow>(self) -> Result<T, DataHelperError> {
        let mut rows = self.first()?;
        let decoded = rows.values().and_then(|values| T::from_row(rows.columns(), &values));
        rows.close();
        decoded
    }
}
