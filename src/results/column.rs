use std::fmt;

use crate::types::SqlValue;

/// The Rust-side representation a column decodes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanType {
    Int,
    Float,
    Text,
    Bool,
    Timestamp,
    Json,
    Blob,
    /// Not known from metadata (e.g. an untyped `SQLite` expression column).
    Unknown,
}

impl ScanType {
    /// Scan type of a decoded value; `Unknown` for NULL.
    #[must_use]
    pub fn of(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => ScanType::Unknown,
            SqlValue::Bool(_) => ScanType::Bool,
            SqlValue::Int(_) => ScanType::Int,
            SqlValue::Float(_) => ScanType::Float,
            SqlValue::Text(_) => ScanType::Text,
            SqlValue::Timestamp(_) => ScanType::Timestamp,
            SqlValue::Blob(_) => ScanType::Blob,
            SqlValue::Json(_) => ScanType::Json,
        }
    }

    /// Name of the Rust type values of this column decode into.
    #[must_use]
    pub fn rust_type_name(self) -> &'static str {
        match self {
            ScanType::Int => "i64",
            ScanType::Float => "f64",
            ScanType::Text => "String",
            ScanType::Bool => "bool",
            ScanType::Timestamp => "chrono::NaiveDateTime",
            ScanType::Json => "serde_json::Value",
            ScanType::Blob => "Vec<u8>",
            ScanType::Unknown => "SqlValue",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rust_type_name())
    }
}

/// Describes one column of a result set. Immutable once produced by a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    database_type_name: String,
    scan_type: ScanType,
}

impl Column {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        database_type_name: impl Into<String>,
        scan_type: ScanType,
    ) -> Self {
        Self {
            name: name.into(),
            database_type_name: database_type_name.into(),
            scan_type,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backend's native type name, upper-cased (e.g. `INT4`, `TEXT`); empty when unknown.
    #[must_use]
    pub fn database_type_name(&self) -> &str {
        &self.database_type_name
    }

    #[must_use]
    pub fn scan_type(&self) -> ScanType {
        self.scan_type
    }

    pub(crate) fn refine_scan_type(&mut self, scan_type: ScanType) {
        if self.scan_type == ScanType::Unknown {
            self.scan_type = scan_type;
        }
    }
}
