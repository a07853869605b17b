//! `SQLite` driver over `rusqlite`.
//!
//! - connection: the driver, its factory and the blocking-call bridge
//! - params: `SqlValue` to `rusqlite` value conversion
//! - query: result extraction with declared-type scan types

pub mod connection;
pub mod params;
pub mod query;

pub use connection::{SqliteDriver, SqliteDriverFactory};
pub use query::build_result_set;
