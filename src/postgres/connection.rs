use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DatabaseInfo;
use crate::dialect::Dialect;
use crate::driver::{Driver, DriverFactory};
use crate::error::DataHelperError;
use crate::results::RowCursor;
use crate::types::{DatabaseType, SqlValue};

use super::params::Params;
use super::query::build_result_set;

/// A single Postgres connection.
///
/// The connection string is anything `tokio_postgres::Config` parses, either
/// `host=... user=...` pairs or a `postgres://` URL. TLS is not negotiated.
pub struct PostgresDriver {
    dialect: Dialect,
    client: Option<Client>,
    connection_task: Option<JoinHandle<()>>,
}

impl PostgresDriver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dialect: Dialect::postgres(),
            client: None,
            connection_task: None,
        }
    }

    fn client(&self) -> Result<&Client, DataHelperError> {
        self.client.as_ref().ok_or(DataHelperError::NoConnection)
    }
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PostgresDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDriver")
            .field("open", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    async fn open(
        &mut self,
        cancel: &CancellationToken,
        info: &DatabaseInfo,
    ) -> Result<(), DataHelperError> {
        let config: tokio_postgres::Config = info
            .require_connection_string()?
            .parse()
            .map_err(|e| DataHelperError::ConfigError(format!("invalid postgres connection string: {e}")))?;

        let (client, connection) = tokio::select! {
            () = cancel.cancelled() => {
                return Err(DataHelperError::Cancelled("postgres open cancelled".into()));
            }
            res = config.connect(NoTls) => res?,
        };
        let task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "postgres connection closed with error");
            }
        });
        debug!(
            hosts = ?config.get_hosts(),
            dbname = config.get_dbname().unwrap_or(""),
            "postgres connection established"
        );
        self.client = Some(client);
        self.connection_task = Some(task);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DataHelperError> {
        // the connection task finishes once its client is gone
        drop(self.client.take());
        if let Some(task) = self.connection_task.take() {
            task.await.map_err(|e| {
                DataHelperError::ExecutionError(format!("postgres connection task join error: {e}"))
            })?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.client.as_ref().is_some_and(|c| !c.is_closed())
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), DataHelperError> {
        self.client()?.batch_execute(sql).await?;
        Ok(())
    }

    async fn query(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Box<dyn RowCursor>, DataHelperError> {
        let client = self.client()?;
        let stmt = client.prepare(sql).await?;
        let params = Params::convert(params);
        let rows = client.query(&stmt, params.as_refs()).await?;
        let rs = build_result_set(stmt.columns(), &rows)?;
        Ok(Box::new(rs.into_cursor()))
    }

    async fn exec(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DataHelperError> {
        let client = self.client()?;
        let stmt = client.prepare(sql).await?;
        let params = Params::convert(params);
        Ok(client.execute(&stmt, params.as_refs()).await?)
    }
}

/// Mints [`PostgresDriver`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriverFactory;

impl DriverFactory for PostgresDriverFactory {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn create(&self) -> Box<dyn Driver> {
        Box::new(PostgresDriver::new())
    }
}
