//! Coercion of string-like input into typed text parameters.
//!
//! The accepted inputs form a closed set, expressed as implementations of
//! [`StringCoercible`]; anything without a textual form fails with
//! [`DataHelperError::NotStringCoercible`] instead of guessing.

use std::borrow::Cow;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::DataHelperError;
use crate::types::{SqlValue, TIMESTAMP_FORMAT};

/// A typed text parameter kind.
pub trait ParameterKind: Default + From<String> + AsRef<str> + Into<SqlValue> {
    /// SQL type name the kind stands for.
    const SQL_TYPE: &'static str;
}

macro_rules! parameter_kind {
    ($(#[$meta:meta])* $name:ident => $sql_type:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl From<String> for $name {
            fn from(value: String) -> Self {
                $name(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<$name> for SqlValue {
            fn from(value: $name) -> Self {
                SqlValue::Text(value.0)
            }
        }

        impl ParameterKind for $name {
            const SQL_TYPE: &'static str = $sql_type;
        }

        impl StringCoercible for $name {
            fn coerce_str(&self) -> Result<Option<Cow<'_, str>>, DataHelperError> {
                Ok(Some(Cow::Borrowed(&self.0)))
            }
        }
    };
}

parameter_kind!(
    /// Bounded-length text parameter.
    VarChar => "varchar"
);
parameter_kind!(
    /// Unbounded text parameter.
    VarCharMax => "varchar(max)"
);
parameter_kind!(
    /// Unbounded wide (Unicode) text parameter.
    NVarCharMax => "nvarchar(max)"
);

/// Input that has a textual form. `Ok(None)` means the input is null.
pub trait StringCoercible {
    /// # Errors
    /// Returns `DataHelperError::NotStringCoercible` for composite values.
    fn coerce_str(&self) -> Result<Option<Cow<'_, str>>, DataHelperError>;
}

impl StringCoercible for str {
    fn coerce_str(&self) -> Result<Option<Cow<'_, str>>, DataHelperError> {
        Ok(Some(Cow::Borrowed(self)))
    }
}

impl StringCoercible for String {
    fn coerce_str(&self) -> Result<Option<Cow<'_, str>>, DataHelperError> {
        Ok(Some(Cow::Borrowed(self.as_str())))
    }
}

impl StringCoercible for Cow<'_, str> {
    fn coerce_str(&self) -> Result<Option<Cow<'_, str>>, DataHelperError> {
        Ok(Some(Cow::Borrowed(self.as_ref())))
    }
}

impl<T: StringCoercible + ?Sized> StringCoercible for &T {
    fn coerce_str(&self) -> Result<Option<Cow<'_, str>>, DataHelperError> {
        (**self).coerce_str()
    }
}

impl<T: StringCoercible + ?Sized> StringCoercible for Box<T> {
    fn coerce_str(&self) -> Result<Option<Cow<'_, str>>, DataHelperError> {
        (**self).coerce_str()
    }
}

impl<T: StringCoercible> StringCoercible for Option<T> {
    fn coerce_str(&self) -> Result<Option<Cow<'_, str>>, DataHelperError> {
        match self {
            Some(value) => value.coerce_str(),
            None => Ok(None),
        }
    }
}

macro_rules! coercible_via_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl StringCoercible for $ty {
                fn coerce_str(&self) -> Result<Option<Cow<'_, str>>, DataHelperError> {
                    Ok(Some(Cow::Owned(self.to_string())))
                }
            }
        )*
    };
}

coercible_via_display!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, isize, usize, f32, f64, bool, char, NaiveDate);

impl StringCoercible for NaiveDateTime {
    fn coerce_str(&self) -> Result<Option<Cow<'_, str>>, DataHelperError> {
        Ok(Some(Cow::Owned(self.format(TIMESTAMP_FORMAT).to_string())))
    }
}

impl StringCoercible for JsonValue {
    fn coerce_str(&self) -> Result<Option<Cow<'_, str>>, DataHelperError> {
        match self {
            JsonValue::Null => Ok(None),
            JsonValue::String(s) => Ok(Some(Cow::Borrowed(s))),
            JsonValue::Bool(b) => Ok(Some(Cow::Owned(b.to_string()))),
            JsonValue::Number(n) => Ok(Some(Cow::Owned(n.to_string()))),
            JsonValue::Array(_) => Err(DataHelperError::NotStringCoercible("JSON array")),
            JsonValue::Object(_) => Err(DataHelperError::NotStringCoercible("JSON object")),
        }
    }
}

impl StringCoercible for SqlValue {
    fn coerce_str(&self) -> Result<Option<Cow<'_, str>>, DataHelperError> {
        match self {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) => Ok(Some(Cow::Borrowed(s))),
            SqlValue::Int(i) => i.coerce_str(),
            SqlValue::Float(f) => f.coerce_str(),
            SqlValue::Bool(b) => b.coerce_str(),
            SqlValue::Timestamp(dt) => dt.coerce_str(),
            SqlValue::Json(value) => value.coerce_str(),
            SqlValue::Blob(bytes) => std::str::from_utf8(bytes)
                .map(|s| Some(Cow::Borrowed(s)))
                .map_err(|_| DataHelperError::NotStringCoercible("non UTF-8 blob")),
        }
    }
}

/// The zero value of a parameter kind (the empty string).
#[must_use]
pub fn zero_value<K: ParameterKind>() -> K {
    K::default()
}

/// Coerce `value` into the parameter kind `K`.
///
/// Null input yields the kind's zero value; textual input is carried over unchanged.
/// ```rust
/// use datahelper_lite::coercion::{to_db_type, NVarCharMax, VarChar};
///
/// let name: VarChar = to_db_type("Sample")?;
/// assert_eq!(name.as_ref(), "Sample");
/// let missing: NVarCharMax = to_db_type(&None::<String>)?;
/// assert_eq!(missing, NVarCharMax::default());
/// # Ok::<(), datahelper_lite::DataHelperError>(())
/// ```
///
/// # Errors
/// Returns `DataHelperError::NotStringCoercible` when the input has no textual form.
pub fn to_db_type<K, V>(value: &V) -> Result<K, DataHelperError>
where
    K: ParameterKind,
    V: StringCoercible + ?Sized,
{
    Ok(match value.coerce_str()? {
        Some(text) => K::from(text.into_owned()),
        None => zero_value(),
    })
}
