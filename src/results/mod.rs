//! Result scanning: column descriptors, the `Rows` cursor, and single-record `Row`.

mod column;
mod decode;
mod result_set;
mod row;
mod rows;

pub use column::{Column, ScanType};
pub use decode::{FromRow, FromValue, ScanDest, TypeMismatch};
pub use result_set::{BufferedCursor, ResultSet};
pub use row::Row;
pub use rows::{RowCursor, Rows};
