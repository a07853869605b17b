use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::DataHelperError;
use crate::translation::{MarkerOptions, MarkerStyle, TemplateSettings};
use crate::types::DatabaseType;

fn default_true() -> bool {
    true
}

/// Connection information handed to `DataHelper::open`.
///
/// Drivers read what they need (usually just the connection string); the helper itself only
/// looks at the templating fields. Loadable from JSON:
/// ```rust
/// use datahelper_lite::prelude::*;
///
/// let info = DatabaseInfo::from_json_str(
///     r#"{ "driver": "sqlite", "connection_string": ":memory:", "schema": "app" }"#,
/// )?;
/// assert_eq!(info.schema.as_deref(), Some("app"));
/// # Ok::<(), DataHelperError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub driver: DatabaseType,
    #[serde(default)]
    pub connection_string: Option<String>,
    /// Schema prepended to `{table}` placeholders.
    #[serde(default)]
    pub schema: Option<String>,
    /// Overrides the driver's native parameter marker.
    #[serde(default)]
    pub parameter_placeholder: Option<String>,
    /// Overrides whether the marker is suffixed with a running index.
    #[serde(default)]
    pub parameter_in_sequence: Option<bool>,
    #[serde(default = "default_true")]
    pub interpolate_tables: bool,
    /// Leave `?` inside quoted strings and comments alone when rewriting markers.
    #[serde(default)]
    pub marker_skips_literals: bool,
    #[serde(default)]
    pub open_timeout_ms: Option<u64>,
}

impl DatabaseInfo {
    #[must_use]
    pub fn new(driver: DatabaseType, connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: Some(connection_string.into()),
            ..Self::empty(driver)
        }
    }

    fn empty(driver: DatabaseType) -> Self {
        Self {
            driver,
            connection_string: None,
            schema: None,
            parameter_placeholder: None,
            parameter_in_sequence: None,
            interpolate_tables: true,
            marker_skips_literals: false,
            open_timeout_ms: None,
        }
    }

    #[must_use]
    pub fn builder(driver: DatabaseType) -> DatabaseInfoBuilder {
        DatabaseInfoBuilder::new(driver)
    }

    /// Parse connection information from JSON.
    ///
    /// # Errors
    /// Returns `DataHelperError::ConfigError` if the JSON is malformed or misses `driver`.
    pub fn from_json_str(json: &str) -> Result<Self, DataHelperError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The connection string, required by every driver.
    ///
    /// # Errors
    /// Returns `DataHelperError::NoConnectionString` if it is unset or blank.
    pub fn require_connection_string(&self) -> Result<&str, DataHelperError> {
        match self.connection_string.as_deref().map(str::trim) {
            Some(conn) if !conn.is_empty() => Ok(conn),
            _ => Err(DataHelperError::NoConnectionString),
        }
    }

    /// Templating settings for statements sent through a driver speaking `dialect`.
    #[must_use]
    pub fn template_settings(&self, dialect: &Dialect) -> TemplateSettings {
        let marker = self
            .parameter_placeholder
            .clone()
            .unwrap_or_else(|| dialect.placeholder.to_owned());
        let style = match self.parameter_in_sequence {
            Some(in_sequence) => MarkerStyle::from_in_sequence(in_sequence),
            None => dialect.marker_style,
        };
        TemplateSettings {
            schema: self.schema.clone().filter(|s| !s.is_empty()),
            interpolate_tables: self.interpolate_tables,
            marker: MarkerOptions {
                style,
                marker,
                skip_literals: self.marker_skips_literals,
                bracket_identifiers: dialect.bracket_identifiers,
            },
        }
    }
}

/// Fluent builder for [`DatabaseInfo`].
#[derive(Debug, Clone)]
pub struct DatabaseInfoBuilder {
    info: DatabaseInfo,
}

impl DatabaseInfoBuilder {
    #[must_use]
    pub fn new(driver: DatabaseType) -> Self {
        Self {
            info: DatabaseInfo::empty(driver),
        }
    }

    #[must_use]
    pub fn connection_string(mut self, conn: impl Into<String>) -> Self {
        self.info.connection_string = Some(conn.into());
        self
    }

    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.info.schema = Some(schema.into());
        self
    }

    #[must_use]
    pub fn placeholder(mut self, marker: impl Into<String>, in_sequence: bool) -> Self {
        self.info.parameter_placeholder = Some(marker.into());
        self.info.parameter_in_sequence = Some(in_sequence);
        self
    }

    #[must_use]
    pub fn interpolate_tables(mut self, enabled: bool) -> Self {
        self.info.interpolate_tables = enabled;
        self
    }

    #[must_use]
    pub fn skip_literals(mut self, enabled: bool) -> Self {
        self.info.marker_skips_literals = enabled;
        self
    }

    #[must_use]
    pub fn open_timeout_ms(mut self, millis: u64) -> Self {
        self.info.open_timeout_ms = Some(millis);
        self
    }

    #[must_use]
    pub fn finish(self) -> DatabaseInfo {
        self.info
    }
}
