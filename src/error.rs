use std::fmt;
use std::sync::Arc;

use thiserror::Error;

const DEFAULT_NO_ROWS_MESSAGE: &str = "no rows in result set";

/// The "no rows" error returned when a single-record query finds nothing.
///
/// Applications that already have a shared "not found" error can install it with
/// [`NoRowsSentinel::new`] (usually through `HelperPrototype::with_no_rows_error`), and every
/// helper minted from that prototype will surface it through [`std::error::Error::source`].
#[derive(Clone, Default)]
pub struct NoRowsSentinel {
    custom: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl NoRowsSentinel {
    #[must_use]
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            custom: Some(Arc::new(err)),
        }
    }

    /// The caller-installed error, if any.
    #[must_use]
    pub fn custom(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.custom.as_deref()
    }

    #[must_use]
    pub fn is_custom(&self) -> bool {
        self.custom.is_some()
    }
}

impl fmt::Debug for NoRowsSentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.custom {
            Some(err) => f.debug_tuple("NoRowsSentinel").field(err).finish(),
            None => f.write_str("NoRowsSentinel(default)"),
        }
    }
}

impl fmt::Display for NoRowsSentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.custom {
            Some(err) => fmt::Display::fmt(err, f),
            None => f.write_str(DEFAULT_NO_ROWS_MESSAGE),
        }
    }
}

impl std::error::Error for NoRowsSentinel {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.custom
            .as_deref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

#[derive(Debug, Error)]
pub enum DataHelperError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[error("no connection of the object was initialized")]
    NoConnection,

    #[error("connection string not set")]
    NoConnectionString,

    #[error("no transaction was initialized")]
    NoTransaction,

    #[error(transparent)]
    NoRows(NoRowsSentinel),

    #[error("array type not supported: {0}")]
    ArrayTypeNotSupported(String),

    #[error("variable in next parameter must be initialized")]
    VariableNotInitialized,

    #[error("no pager was set or initialized")]
    NoPagerConfigured,

    #[error("no helper registered under the name `{0}`")]
    NoHelperRegistered(String),

    #[error("savepoint `{0}` already exists in the current transaction")]
    DuplicateSavepoint(String),

    #[error("savepoint `{0}` not found")]
    SavepointNotFound(String),

    #[error("invalid identifier `{0}`")]
    InvalidIdentifier(String),

    #[error("unknown transaction token `{0}`")]
    UnknownTransactionToken(String),

    #[error("no current row: next() has not returned true or the cursor is exhausted")]
    NoCurrentRow,

    #[error("cursor is closed")]
    CursorClosed,

    #[error("column count mismatch: result has {columns} columns but {destinations} destinations were given")]
    ColumnCountMismatch { columns: usize, destinations: usize },

    #[error("cannot convert column `{column}` from {found} into {expected}")]
    TypeConversion {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("value not string-coercible: {0}")]
    NotStringCoercible(&'static str),

    #[error("operator `{0}` is not supported in verification expressions")]
    InvalidOperator(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}

impl DataHelperError {
    /// True for the "no rows" sentinel, default or caller-installed.
    #[must_use]
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows(_))
    }
}

impl From<serde_json::Error> for DataHelperError {
    fn from(err: serde_json::Error) -> Self {
        DataHelperError::ConfigError(format!("invalid database info: {err}"))
    }
}
