use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::DatabaseInfo;
use crate::dialect::Dialect;
use crate::driver::{Driver, DriverFactory};
use crate::error::DataHelperError;
use crate::results::RowCursor;
use crate::types::{DatabaseType, SqlValue};

use super::params::Params;
use super::query::build_result_set;

pub(crate) type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

/// Run a closure against the connection on the blocking thread pool.
async fn run_blocking<F, R>(conn: SharedSqliteConnection, func: F) -> Result<R, DataHelperError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, DataHelperError> + Send + 'static,
    R: Send + 'static,
{
    spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| DataHelperError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}

/// A single `SQLite` connection. The connection string is a file path, a `file:` URI
/// or `:memory:`.
#[derive(Debug)]
pub struct SqliteDriver {
    dialect: Dialect,
    conn: Option<SharedSqliteConnection>,
}

impl SqliteDriver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dialect: Dialect::sqlite(),
            conn: None,
        }
    }

    fn handle(&self) -> Result<SharedSqliteConnection, DataHelperError> {
        self.conn.clone().ok_or(DataHelperError::NoConnection)
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    async fn open(
        &mut self,
        cancel: &CancellationToken,
        info: &DatabaseInfo,
    ) -> Result<(), DataHelperError> {
        let path = info.require_connection_string()?.to_owned();
        let connect = spawn_blocking(move || rusqlite::Connection::open(path));
        let conn = tokio::select! {
            () = cancel.cancelled() => {
                return Err(DataHelperError::Cancelled("sqlite open cancelled".into()));
            }
            joined = connect => joined.map_err(|e| {
                DataHelperError::ConnectionError(format!("sqlite open join error: {e}"))
            })??,
        };
        debug!("sqlite connection opened");
        self.conn = Some(Arc::new(Mutex::new(conn)));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DataHelperError> {
        let Some(shared) = self.conn.take() else {
            return Ok(());
        };
        match Arc::try_unwrap(shared) {
            Ok(mutex) => {
                let conn = mutex.into_inner();
                spawn_blocking(move || conn.close().map_err(|(_, err)| err))
                    .await
                    .map_err(|e| {
                        DataHelperError::ExecutionError(format!("sqlite close join error: {e}"))
                    })??;
            }
            // a blocking task still holds a handle; the connection closes when it drops
            Err(_) => debug!("sqlite connection still referenced at close"),
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), DataHelperError> {
        let sql = sql.to_owned();
        run_blocking(self.handle()?, move |conn| {
            conn.execute_batch(&sql).map_err(DataHelperError::SqliteError)
        })
        .await
    }

    async fn query(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Box<dyn RowCursor>, DataHelperError> {
        let sql = sql.to_owned();
        let params = Params::convert(params);
        let rs = run_blocking(self.handle()?, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            build_result_set(&mut stmt, &params)
        })
        .await?;
        Ok(Box::new(rs.into_cursor()))
    }

    async fn exec(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DataHelperError> {
        let sql = sql.to_owned();
        let params = Params::convert(params);
        let affected = run_blocking(self.handle()?, move |conn| {
            let param_refs = params.as_refs();
            conn.execute(&sql, &param_refs[..])
                .map_err(DataHelperError::SqliteError)
        })
        .await?;
        Ok(affected as u64)
    }
}

/// Mints [`SqliteDriver`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriverFactory;

impl DriverFactory for SqliteDriverFactory {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn create(&self) -> Box<dyn Driver> {
        Box::new(SqliteDriver::new())
    }
}
