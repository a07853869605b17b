//! Vendor-neutral database access: one helper type that opens a connection, templates
//! statement text for the connected backend, scans results and manages transactions
//! with named savepoints.
//!
//! ```rust,no_run
//! use datahelper_lite::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), DataHelperError> {
//! let registry = HelperRegistry::with_defaults();
//! let mut helper = new_helper(None, "sqlite", &registry)?;
//! let info = DatabaseInfo::new(DatabaseType::Sqlite, "app.db");
//! helper.open(&CancellationToken::new(), &info).await?;
//!
//! let names: Vec<String> = helper
//!     .query_array("select name from {customers} where active = ?", &[true.into()])
//!     .await?;
//! # let _ = names;
//! helper.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod coercion;
pub mod config;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod helper;
pub mod prelude;
pub mod registry;
pub mod results;
pub mod translation;
pub mod types;

mod transaction;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{DataHelperError, NoRowsSentinel};
pub use helper::DataHelper;
