//! The vendor-neutral helper: one driver connection plus templating and transaction state.

mod tx;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DatabaseInfo;
use crate::dialect::Dialect;
use crate::driver::{Driver, DriverFactory};
use crate::error::{DataHelperError, NoRowsSentinel};
use crate::registry::HelperPrototype;
use crate::results::{FromRow, Row, Rows};
use crate::transaction::TxState;
use crate::translation::{TemplateSettings, prepare_sql, validate_qualified_identifier};
use crate::types::{DatabaseType, SqlValue, VerifyExpression};

/// Per-helper behaviour carried from a prototype to every helper it mints.
#[derive(Debug, Clone, Default)]
pub struct HelperSettings {
    /// Error returned by `Row` lookups that find nothing.
    pub no_rows: NoRowsSentinel,
}

/// Which page of a paged query to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    /// 1-based page number; 0 is treated as 1.
    pub page: u64,
    pub page_size: u64,
}

impl PageParams {
    #[must_use]
    pub fn new(page: u64, page_size: u64) -> Self {
        Self { page, page_size }
    }
}

const VERIFY_OPERATORS: &[&str] = &["=", "<>", "!=", "<", "<=", ">", ">=", "LIKE", "NOT LIKE"];

/// Database access through one driver connection.
///
/// A helper is single-owner: it holds one connection and one transaction state machine.
/// Concurrent work needs one helper per unit of work, minted cheaply with
/// [`DataHelper::new_helper`] or through a [`HelperRegistry`](crate::registry::HelperRegistry).
///
/// Statement text may use `{table}` placeholders and `?` parameter markers; both are
/// rewritten for the connected backend before the driver sees them.
pub struct DataHelper {
    driver: Box<dyn Driver>,
    factory: Arc<dyn DriverFactory>,
    settings: HelperSettings,
    template: TemplateSettings,
    tx: TxState,
    opened: bool,
}

impl DataHelper {
    #[must_use]
    pub fn new(factory: Arc<dyn DriverFactory>, settings: HelperSettings) -> Self {
        Self {
            driver: factory.create(),
            factory,
            settings,
            template: TemplateSettings::default(),
            tx: TxState::default(),
            opened: false,
        }
    }

    /// A fresh, unopened helper using the same driver factory and settings.
    #[must_use]
    pub fn new_helper(&self) -> DataHelper {
        DataHelper::new(Arc::clone(&self.factory), self.settings.clone())
    }

    #[must_use]
    pub fn prototype(&self) -> HelperPrototype {
        HelperPrototype::from_parts(Arc::clone(&self.factory), self.settings.clone())
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.factory.database_type()
    }

    #[must_use]
    pub fn dialect(&self) -> &Dialect {
        self.driver.dialect()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.opened
    }

    #[must_use]
    pub fn template_settings(&self) -> &TemplateSettings {
        &self.template
    }

    /// Connect the helper. An already open helper is closed first.
    ///
    /// # Errors
    /// `NoConnectionString` for incomplete `info`, `Cancelled` when `cancel` fires
    /// before the driver connects, `ConnectionError` when `open_timeout_ms` elapses,
    /// or the driver's own error.
    pub async fn open(
        &mut self,
        cancel: &CancellationToken,
        info: &DatabaseInfo,
    ) -> Result<(), DataHelperError> {
        if self.opened {
            self.close().await?;
        }
        info.require_connection_string()?;
        if cancel.is_cancelled() {
            return Err(DataHelperError::Cancelled("open cancelled".into()));
        }

        let driver = &mut self.driver;
        let connect = async {
            match info.open_timeout_ms {
                Some(ms) => tokio::time::timeout(
                    Duration::from_millis(ms),
                    driver.open(cancel, info),
                )
                .await
                .map_err(|_| {
                    DataHelperError::ConnectionError(format!("open timed out after {ms} ms"))
                })?,
                None => driver.open(cancel, info).await,
            }
        };
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(DataHelperError::Cancelled("open cancelled".into()));
            }
            res = connect => res?,
        }

        self.template = info.template_settings(self.driver.dialect());
        self.tx = TxState::default();
        self.opened = true;
        info!(
            driver = %info.driver,
            schema = info.schema.as_deref().unwrap_or(""),
            "database helper opened"
        );
        Ok(())
    }

    /// Close the connection, rolling back a transaction left open.
    ///
    /// # Errors
    /// Returns the driver's close error.
    pub async fn close(&mut self) -> Result<(), DataHelperError> {
        if !self.opened {
            return Ok(());
        }
        if self.tx.is_active() {
            warn!(
                depth = self.tx.depth(),
                "closing with an active transaction, rolling back"
            );
            if let Err(err) = self.driver.rollback().await {
                warn!(error = %err, "rollback on close failed");
            }
            self.tx.finish();
        }
        self.opened = false;
        let closed = self.driver.close().await;
        info!(driver = %self.database_type(), "database helper closed");
        closed
    }

    pub(crate) fn ensure_open(&self) -> Result<(), DataHelperError> {
        if self.opened {
            Ok(())
        } else {
            Err(DataHelperError::NoConnection)
        }
    }

    fn prepare(&self, sql: &str, param_count: usize) -> String {
        let prepared = prepare_sql(sql, &self.template).into_owned();
        debug!(sql = %prepared, params = param_count, "dispatching statement");
        prepared
    }

    /// Run a statement that returns records.
    ///
    /// # Errors
    /// `NoConnection` before `open`, otherwise the driver's error.
    pub async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Rows, DataHelperError> {
        self.ensure_open()?;
        let sql = self.prepare(sql, params.len());
        let cursor = self.driver.query(&sql, params).await?;
        Ok(Rows::new(cursor))
    }

    /// Run a statement expected to return at most one record. Errors are deferred to the [`Row`].
    pub async fn query_row(&mut self, sql: &str, params: &[SqlValue]) -> Row {
        let rows = self.query(sql, params).await;
        Row::new(rows, self.settings.no_rows.clone())
    }

    /// Run a DML statement and return the number of rows affected.
    ///
    /// # Errors
    /// `NoConnection` before `open`, otherwise the driver's error.
    pub async fn exec(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DataHelperError> {
        self.ensure_open()?;
        let sql = self.prepare(sql, params.len());
        self.driver.exec(&sql, params).await
    }

    /// Whether the query returns at least one record.
    ///
    /// # Errors
    /// As [`DataHelper::query`], plus any error raised while reading the first record.
    pub async fn exists(&mut self, sql: &str, params: &[SqlValue]) -> Result<bool, DataHelperError> {
        let mut rows = self.query(sql, params).await?;
        let found = rows.next();
        if let Some(err) = rows.take_err() {
            return Err(err);
        }
        rows.close();
        Ok(found)
    }

    /// Read every record into a `Vec<T>`.
    ///
    /// # Errors
    /// As [`DataHelper::query`], plus `ArrayTypeNotSupported` when `T` cannot hold a
    /// record of this shape.
    pub async fn query_array<T: FromRow>(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<T>, DataHelperError> {
        self.query(sql, params).await?.collect_rows()
    }

    /// Read one page of a query. The statement should carry its own `ORDER BY`.
    ///
    /// # Errors
    /// `NoPagerConfigured` when `pager` is `None`, `ExecutionError` for a zero page size,
    /// otherwise as [`DataHelper::query`].
    pub async fn query_paged(
        &mut self,
        pager: Option<&PageParams>,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Rows, DataHelperError> {
        let pager = pager.ok_or(DataHelperError::NoPagerConfigured)?;
        if pager.page_size == 0 {
            return Err(DataHelperError::ExecutionError(
                "page size must be greater than zero".into(),
            ));
        }
        self.ensure_open()?;
        let prepared = self.prepare(sql, params.len());
        let paged = self
            .driver
            .dialect()
            .paginate(&prepared, pager.page, pager.page_size);
        let cursor = self.driver.query(&paged, params).await?;
        Ok(Rows::new(cursor))
    }

    /// Fetch the next value of sequence `serial` into `next`.
    ///
    /// # Errors
    /// `VariableNotInitialized` when `next` is `None`, `InvalidIdentifier` for a malformed
    /// sequence name, `Unsupported` on backends without sequences.
    pub async fn next(
        &mut self,
        serial: &str,
        next: Option<&mut i64>,
    ) -> Result<(), DataHelperError> {
        let out = next.ok_or(DataHelperError::VariableNotInitialized)?;
        self.ensure_open()?;
        let serial = validate_qualified_identifier(serial)?;
        let sql = self.dialect().next_value(serial).ok_or_else(|| {
            DataHelperError::Unsupported(format!(
                "{} has no sequences",
                self.database_type()
            ))
        })?;
        *out = self.scalar::<i64>(&sql).await?;
        debug!(serial, value = *out, "fetched next sequence value");
        Ok(())
    }

    /// Check that a record of `table` satisfies every expression.
    ///
    /// The expressions are ANDed into one `SELECT COUNT(*)`. An empty list holds vacuously.
    /// Operators are limited to comparisons and `LIKE`; a NULL value turns `=` into
    /// `IS NULL` and `<>` into `IS NOT NULL`.
    ///
    /// # Errors
    /// `InvalidIdentifier` for malformed table or column names, `InvalidOperator` for an
    /// operator outside the allowed set, otherwise as [`DataHelper::query`].
    pub async fn verify_within(
        &mut self,
        table: &str,
        expressions: &[VerifyExpression],
    ) -> Result<bool, DataHelperError> {
        self.ensure_open()?;
        if expressions.is_empty() {
            return Ok(true);
        }
        let table = validate_qualified_identifier(table)?;
        let mut clauses = Vec::with_capacity(expressions.len());
        let mut params = Vec::new();
        for expr in expressions {
            let (clause, param) = verify_clause(expr)?;
            clauses.push(clause);
            params.extend(param);
        }
        // qualified names are taken as given; bare ones pick up the configured schema
        let target = if table.contains('.') {
            table.to_owned()
        } else {
            format!("{{{table}}}")
        };
        let sql = format!(
            "SELECT COUNT(*) FROM {target} WHERE {}",
            clauses.join(" AND ")
        );
        let count: i64 = self.query_row(&sql, &params).await.get()?;
        Ok(count > 0)
    }

    /// Double single quotes so `value` can sit inside a SQL string literal.
    #[must_use]
    pub fn escape(&self, value: &str) -> String {
        value.replace('\'', "''")
    }

    /// # Errors
    /// `NoConnection` before `open`, otherwise the driver's error.
    pub async fn database_version(&mut self) -> Result<String, DataHelperError> {
        self.ensure_open()?;
        let sql = self.dialect().version_sql;
        self.scalar::<String>(sql).await
    }

    /// The database server's local time.
    ///
    /// # Errors
    /// `NoConnection` before `open`, otherwise the driver's error.
    pub async fn now(&mut self) -> Result<NaiveDateTime, DataHelperError> {
        self.ensure_open()?;
        let sql = self.dialect().now_sql;
        self.scalar::<NaiveDateTime>(sql).await
    }

    /// The database server's time in UTC.
    ///
    /// # Errors
    /// `NoConnection` before `open`, otherwise the driver's error.
    pub async fn now_utc(&mut self) -> Result<DateTime<Utc>, DataHelperError> {
        self.ensure_open()?;
        let sql = self.dialect().now_utc_sql;
        Ok(self.scalar::<NaiveDateTime>(sql).await?.and_utc())
    }

    /// Run dialect-supplied SQL, which bypasses templating, and decode the single value.
    async fn scalar<T: FromRow>(&mut self, sql: &str) -> Result<T, DataHelperError> {
        debug!(sql, "dispatching dialect statement");
        let rows = self.driver.query(sql, &[]).await.map(Rows::new);
        Row::new(rows, self.settings.no_rows.clone()).get()
    }
}

fn verify_clause(expr: &VerifyExpression) -> Result<(String, Option<SqlValue>), DataHelperError> {
    let column = validate_qualified_identifier(&expr.name)?;
    let operator = match expr.operator.trim() {
        "" => "=".to_owned(),
        op => op.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase(),
    };
    if !VERIFY_OPERATORS.contains(&operator.as_str()) {
        return Err(DataHelperError::InvalidOperator(expr.operator.clone()));
    }
    if expr.value.is_null() {
        return match operator.as_str() {
            "=" => Ok((format!("{column} IS NULL"), None)),
            "<>" | "!=" => Ok((format!("{column} IS NOT NULL"), None)),
            _ => Err(DataHelperError::InvalidOperator(format!(
                "{operator} cannot compare with NULL"
            ))),
        };
    }
    Ok((format!("{column} {operator} ?"), Some(expr.value.clone())))
}

impl fmt::Debug for DataHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataHelper")
            .field("database_type", &self.database_type())
            .field("opened", &self.opened)
            .field("template", &self.template)
            .field("tx", &self.tx)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
