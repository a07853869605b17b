//! An in-memory driver that records statements, for exercising helper logic without a database.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::DatabaseInfo;
use crate::dialect::Dialect;
use crate::driver::{Driver, DriverFactory};
use crate::error::DataHelperError;
use crate::results::{ResultSet, RowCursor};
use crate::types::{DatabaseType, SqlValue};

#[derive(Debug, Default)]
struct Recording {
    statements: Vec<(String, Vec<SqlValue>)>,
    results: VecDeque<ResultSet>,
    affected: VecDeque<u64>,
    fail_next: Option<String>,
    open_delay: Option<Duration>,
    opens: usize,
}

/// Handle onto what a [`RecordingDriver`] has seen; clones share state.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    inner: Arc<Mutex<Recording>>,
}

impl Recorder {
    fn lock(&self) -> MutexGuard<'_, Recording> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Statements received so far, oldest first.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.iter().map(|(sql, _)| sql.clone()).collect()
    }

    #[must_use]
    pub fn last_params(&self) -> Option<Vec<SqlValue>> {
        self.lock().statements.last().map(|(_, params)| params.clone())
    }

    #[must_use]
    pub fn opens(&self) -> usize {
        self.lock().opens
    }

    pub fn clear(&self) {
        self.lock().statements.clear();
    }

    /// Queue the result of a later `query`. Queries with nothing queued return no rows.
    pub fn push_result(&self, rs: ResultSet) {
        self.lock().results.push_back(rs);
    }

    /// Queue the row count of a later `exec`. Unqueued execs report 0.
    pub fn push_affected(&self, rows: u64) {
        self.lock().affected.push_back(rows);
    }

    /// Fail the next statement with `ExecutionError(message)`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.lock().fail_next = Some(message.into());
    }

    /// Make `open` wait before connecting.
    pub fn set_open_delay(&self, delay: Duration) {
        self.lock().open_delay = Some(delay);
    }

    fn record(&self, sql: &str, params: &[SqlValue]) -> Result<(), DataHelperError> {
        let mut rec = self.lock();
        if let Some(message) = rec.fail_next.take() {
            return Err(DataHelperError::ExecutionError(message));
        }
        rec.statements.push((sql.to_owned(), params.to_vec()));
        Ok(())
    }
}

#[derive(Debug)]
pub struct RecordingDriver {
    dialect: Dialect,
    recorder: Recorder,
    open: bool,
}

#[async_trait]
impl Driver for RecordingDriver {
    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    async fn open(
        &mut self,
        cancel: &CancellationToken,
        _info: &DatabaseInfo,
    ) -> Result<(), DataHelperError> {
        let delay = self.recorder.lock().open_delay;
        if let Some(delay) = delay {
            tokio::select! {
                () = cancel.cancelled() => {
                    return Err(DataHelperError::Cancelled("open cancelled".into()));
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
        self.recorder.lock().opens += 1;
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DataHelperError> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), DataHelperError> {
        self.recorder.record(sql, &[])
    }

    async fn query(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Box<dyn RowCursor>, DataHelperError> {
        self.recorder.record(sql, params)?;
        let rs = self.recorder.lock().results.pop_front().unwrap_or_default();
        Ok(Box::new(rs.into_cursor()))
    }

    async fn exec(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DataHelperError> {
        self.recorder.record(sql, params)?;
        Ok(self.recorder.lock().affected.pop_front().unwrap_or(0))
    }
}

/// Factory for [`RecordingDriver`]s sharing one [`Recorder`].
#[derive(Debug, Clone)]
pub struct RecordingFactory {
    dialect: Dialect,
    recorder: Recorder,
}

impl RecordingFactory {
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            recorder: Recorder::default(),
        }
    }

    #[must_use]
    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }
}

impl DriverFactory for RecordingFactory {
    fn database_type(&self) -> DatabaseType {
        self.dialect.database_type
    }

    fn create(&self) -> Box<dyn Driver> {
        Box::new(RecordingDriver {
            dialect: self.dialect.clone(),
            recorder: self.recorder.clone(),
            open: false,
        })
    }
}
