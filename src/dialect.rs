//! Backend SQL fragments: transaction verbs, savepoints, paging, sequences and clocks.
//!
//! A [`Dialect`] is plain data. Drivers hand one to the helper, which renders the
//! fragments and sends them through the driver untouched by templating.

use crate::translation::MarkerStyle;
use crate::types::DatabaseType;

/// How a backend spells "skip m rows, return n".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingSyntax {
    /// `LIMIT n OFFSET m`
    LimitOffset,
    /// `OFFSET m ROWS FETCH NEXT n ROWS ONLY`
    OffsetFetch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    pub database_type: DatabaseType,
    /// Native bound-parameter marker.
    pub placeholder: &'static str,
    pub marker_style: MarkerStyle,
    /// Identifiers may be quoted as `[name]`.
    pub bracket_identifiers: bool,
    pub begin_sql: &'static str,
    pub commit_sql: &'static str,
    pub rollback_sql: &'static str,
    /// Templates take the savepoint name through `{name}`.
    pub savepoint_sql: &'static str,
    /// `None` when the backend has no release statement.
    pub release_savepoint_sql: Option<&'static str>,
    pub rollback_to_savepoint_sql: &'static str,
    pub paging: PagingSyntax,
    /// Sequence fetch template (`{name}`); `None` when the backend has no sequences.
    pub next_value_sql: Option<&'static str>,
    pub version_sql: &'static str,
    /// Local wall-clock time, no zone.
    pub now_sql: &'static str,
    pub now_utc_sql: &'static str,
}

impl Dialect {
    #[must_use]
    pub fn postgres() -> Self {
        Self {
            database_type: DatabaseType::Postgres,
            placeholder: "$",
            marker_style: MarkerStyle::Numbered,
            bracket_identifiers: false,
            begin_sql: "BEGIN",
            commit_sql: "COMMIT",
            rollback_sql: "ROLLBACK",
            savepoint_sql: "SAVEPOINT {name}",
            release_savepoint_sql: Some("RELEASE SAVEPOINT {name}"),
            rollback_to_savepoint_sql: "ROLLBACK TO SAVEPOINT {name}",
            paging: PagingSyntax::LimitOffset,
            next_value_sql: Some("SELECT nextval('{name}')"),
            version_sql: "SELECT current_setting('server_version')",
            now_sql: "SELECT LOCALTIMESTAMP",
            now_utc_sql: "SELECT (CURRENT_TIMESTAMP AT TIME ZONE 'UTC')",
        }
    }

    #[must_use]
    pub fn sqlite() -> Self {
        Self {
            database_type: DatabaseType::Sqlite,
            placeholder: "?",
            marker_style: MarkerStyle::Repeated,
            bracket_identifiers: false,
            begin_sql: "BEGIN",
            commit_sql: "COMMIT",
            rollback_sql: "ROLLBACK",
            savepoint_sql: "SAVEPOINT {name}",
            release_savepoint_sql: Some("RELEASE SAVEPOINT {name}"),
            rollback_to_savepoint_sql: "ROLLBACK TO SAVEPOINT {name}",
            paging: PagingSyntax::LimitOffset,
            next_value_sql: None,
            version_sql: "SELECT sqlite_version()",
            now_sql: "SELECT strftime('%Y-%m-%d %H:%M:%f','now','localtime')",
            now_utc_sql: "SELECT strftime('%Y-%m-%d %H:%M:%f','now')",
        }
    }

    /// SQL Server. No driver ships with this crate; external drivers can reuse the dialect.
    #[must_use]
    pub fn mssql() -> Self {
        Self {
            database_type: DatabaseType::Mssql,
            placeholder: "@p",
            marker_style: MarkerStyle::Numbered,
            bracket_identifiers: true,
            begin_sql: "BEGIN TRANSACTION",
            commit_sql: "COMMIT TRANSACTION",
            rollback_sql: "ROLLBACK TRANSACTION",
            savepoint_sql: "SAVE TRANSACTION {name}",
            release_savepoint_sql: None,
            rollback_to_savepoint_sql: "ROLLBACK TRANSACTION {name}",
            paging: PagingSyntax::OffsetFetch,
            next_value_sql: Some("SELECT NEXT VALUE FOR {name}"),
            version_sql: "SELECT @@VERSION",
            now_sql: "SELECT SYSDATETIME()",
            now_utc_sql: "SELECT SYSUTCDATETIME()",
        }
    }

    #[must_use]
    pub fn for_database(database_type: DatabaseType) -> Self {
        match database_type {
            DatabaseType::Postgres => Self::postgres(),
            DatabaseType::Sqlite => Self::sqlite(),
            DatabaseType::Mssql => Self::mssql(),
        }
    }

    /// Substitute `name` into a `{name}` template. Callers validate `name` first.
    #[must_use]
    pub fn render(template: &str, name: &str) -> String {
        template.replace("{name}", name)
    }

    #[must_use]
    pub fn savepoint(&self, name: &str) -> String {
        Self::render(self.savepoint_sql, name)
    }

    #[must_use]
    pub fn release_savepoint(&self, name: &str) -> Option<String> {
        self.release_savepoint_sql
            .map(|template| Self::render(template, name))
    }

    #[must_use]
    pub fn rollback_to_savepoint(&self, name: &str) -> String {
        Self::render(self.rollback_to_savepoint_sql, name)
    }

    #[must_use]
    pub fn next_value(&self, sequence: &str) -> Option<String> {
        self.next_value_sql
            .map(|template| Self::render(template, sequence))
    }

    /// Append the paging clause for 1-based `page` of `page_size` rows.
    ///
    /// `OFFSET ... FETCH` requires an `ORDER BY`; the statement must supply one.
    #[must_use]
    pub fn paginate(&self, sql: &str, page: u64, page_size: u64) -> String {
        let offset = page.saturating_sub(1).saturating_mul(page_size);
        let base = sql.trim_end().trim_end_matches(';').trim_end();
        match self.paging {
            PagingSyntax::LimitOffset => format!("{base} LIMIT {page_size} OFFSET {offset}"),
            PagingSyntax::OffsetFetch => {
                format!("{base} OFFSET {offset} ROWS FETCH NEXT {page_size} ROWS ONLY")
            }
        }
    }
}
