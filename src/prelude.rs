//! Convenient imports for common functionality.

pub use crate::coercion::{NVarCharMax, ParameterKind, VarChar, VarCharMax, to_db_type, zero_value};
pub use crate::config::{DatabaseInfo, DatabaseInfoBuilder};
pub use crate::dialect::Dialect;
pub use crate::driver::{Driver, DriverFactory};
pub use crate::error::{DataHelperError, NoRowsSentinel};
pub use crate::helper::{DataHelper, HelperSettings, PageParams};
pub use crate::registry::{HelperPrototype, HelperRegistry, new_helper};
pub use crate::results::{Column, FromRow, FromValue, ResultSet, Row, Rows, ScanType};
pub use crate::translation::{MarkerStyle, interpolate_table, replace_param_marker};
pub use crate::types::{DatabaseType, ReadType, ReturnKind, SqlValue, VerifyExpression};

#[cfg(feature = "postgres")]
pub use crate::postgres::PostgresDriverFactory;
#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteDriverFactory;
