//! Named helper prototypes.
//!
//! The registry is an ordinary value owned by the application's composition root and
//! passed by reference to whatever needs to mint helpers.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::driver::DriverFactory;
use crate::error::{DataHelperError, NoRowsSentinel};
use crate::helper::{DataHelper, HelperSettings};
use crate::types::DatabaseType;

/// Everything needed to mint helpers of one kind: a driver factory and helper settings.
#[derive(Clone)]
pub struct HelperPrototype {
    factory: Arc<dyn DriverFactory>,
    settings: HelperSettings,
}

impl HelperPrototype {
    #[must_use]
    pub fn new(factory: impl DriverFactory + 'static) -> Self {
        Self::from_parts(Arc::new(factory), HelperSettings::default())
    }

    #[must_use]
    pub fn from_parts(factory: Arc<dyn DriverFactory>, settings: HelperSettings) -> Self {
        Self { factory, settings }
    }

    /// Install the error single-record lookups return when nothing matches.
    #[must_use]
    pub fn with_no_rows_error<E>(mut self, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.settings.no_rows = NoRowsSentinel::new(err);
        self
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.factory.database_type()
    }

    #[must_use]
    pub fn settings(&self) -> &HelperSettings {
        &self.settings
    }

    /// A fresh, unopened helper.
    #[must_use]
    pub fn new_helper(&self) -> DataHelper {
        DataHelper::new(Arc::clone(&self.factory), self.settings.clone())
    }
}

impl fmt::Debug for HelperPrototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperPrototype")
            .field("database_type", &self.database_type())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Prototypes registered under string keys.
#[derive(Debug, Default)]
pub struct HelperRegistry {
    prototypes: RwLock<HashMap<String, HelperPrototype>>,
}

impl HelperRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the bundled drivers registered under `sqlite` and `postgres`.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        #[cfg(feature = "sqlite")]
        registry.register(
            DatabaseType::Sqlite.as_str(),
            HelperPrototype::new(crate::sqlite::SqliteDriverFactory),
        );
        #[cfg(feature = "postgres")]
        registry.register(
            DatabaseType::Postgres.as_str(),
            HelperPrototype::new(crate::postgres::PostgresDriverFactory),
        );
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, HelperPrototype>> {
        match self.prototypes.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, HelperPrototype>> {
        match self.prototypes.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register `prototype` under `name`, returning the prototype it replaces.
    pub fn register(
        &self,
        name: impl Into<String>,
        prototype: HelperPrototype,
    ) -> Option<HelperPrototype> {
        let name = name.into();
        debug!(name = %name, database_type = %prototype.database_type(), "helper registered");
        self.write().insert(name, prototype)
    }

    /// # Errors
    /// Returns `NoHelperRegistered` when nothing is registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<HelperPrototype, DataHelperError> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| DataHelperError::NoHelperRegistered(name.to_owned()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Return `existing` when given, otherwise a fresh helper from the prototype under `name`.
///
/// # Errors
/// Returns `NoHelperRegistered` when `existing` is `None` and `name` is unknown.
pub fn new_helper(
    existing: Option<DataHelper>,
    name: &str,
    registry: &HelperRegistry,
) -> Result<DataHelper, DataHelperError> {
    match existing {
        Some(helper) => Ok(helper),
        None => Ok(registry.resolve(name)?.new_helper()),
    }
}
