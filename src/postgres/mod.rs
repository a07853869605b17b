//! Postgres driver over `tokio-postgres`.
//!
//! - connection: the driver and its factory
//! - params: `ToSql` for `SqlValue`, adapting to the parameter types the server infers
//! - query: row extraction into `SqlValue`

pub mod connection;
pub mod params;
pub mod query;

pub use connection::{PostgresDriver, PostgresDriverFactory};
pub use query::build_result_set;
