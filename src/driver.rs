use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::DatabaseInfo;
use crate::dialect::Dialect;
use crate::error::DataHelperError;
use crate::results::RowCursor;
use crate::types::{DatabaseType, SqlValue};

/// A concrete database connection the helper orchestrates.
///
/// Statement text reaching a driver has already been templated; drivers bind `params`
/// positionally and never rewrite SQL themselves.
#[async_trait]
pub trait Driver: Send {
    fn dialect(&self) -> &Dialect;

    /// Connect using `info`. Implementations should give up when `cancel` fires.
    async fn open(
        &mut self,
        cancel: &CancellationToken,
        info: &DatabaseInfo,
    ) -> Result<(), DataHelperError>;

    /// Drop the connection. Closing a closed driver is a no-op.
    async fn close(&mut self) -> Result<(), DataHelperError>;

    fn is_open(&self) -> bool;

    /// Executes one or more parameterless statements.
    async fn execute_batch(&mut self, sql: &str) -> Result<(), DataHelperError>;

    /// Executes a statement that returns records.
    async fn query(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Box<dyn RowCursor>, DataHelperError>;

    /// Executes a DML statement and returns the number of rows affected.
    async fn exec(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DataHelperError>;

    async fn begin(&mut self) -> Result<(), DataHelperError> {
        let sql = self.dialect().begin_sql;
        self.execute_batch(sql).await
    }

    async fn commit(&mut self) -> Result<(), DataHelperError> {
        let sql = self.dialect().commit_sql;
        self.execute_batch(sql).await
    }

    async fn rollback(&mut self) -> Result<(), DataHelperError> {
        let sql = self.dialect().rollback_sql;
        self.execute_batch(sql).await
    }

    async fn savepoint(&mut self, name: &str) -> Result<(), DataHelperError> {
        let sql = self.dialect().savepoint(name);
        self.execute_batch(&sql).await
    }

    /// Backends without a release statement keep the savepoint until the transaction ends.
    async fn release_savepoint(&mut self, name: &str) -> Result<(), DataHelperError> {
        match self.dialect().release_savepoint(name) {
            Some(sql) => self.execute_batch(&sql).await,
            None => Ok(()),
        }
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), DataHelperError> {
        let sql = self.dialect().rollback_to_savepoint(name);
        self.execute_batch(&sql).await
    }
}

/// Mints fresh, unopened drivers for one backend.
pub trait DriverFactory: Send + Sync {
    fn database_type(&self) -> DatabaseType;

    fn create(&self) -> Box<dyn Driver>;
}
