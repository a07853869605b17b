use std::sync::Arc;

use datahelper_lite::prelude::*;
use datahelper_lite::test_utils::RecordingFactory;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
#[error("customer not found")]
struct CustomerNotFound;

#[test]
fn unknown_names_are_reported() {
    let registry = HelperRegistry::new();
    let err = new_helper(None, "oracle", &registry).unwrap_err();
    assert!(matches!(err, DataHelperError::NoHelperRegistered(name) if name == "oracle"));
}

#[test]
fn defaults_register_bundled_drivers() {
    let registry = HelperRegistry::with_defaults();
    #[cfg(feature = "sqlite")]
    assert!(registry.contains("sqlite"));
    #[cfg(feature = "postgres")]
    assert!(registry.contains("postgres"));
    let names = registry.names();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[test]
fn registering_twice_replaces_the_prototype() {
    let registry = HelperRegistry::new();
    let first = HelperPrototype::new(RecordingFactory::new(Dialect::sqlite()));
    let second = HelperPrototype::new(RecordingFactory::new(Dialect::mssql()));
    assert!(registry.register("app", first).is_none());
    let replaced = registry.register("app", second).unwrap();
    assert_eq!(replaced.database_type(), DatabaseType::Sqlite);
    assert_eq!(
        registry.resolve("app").unwrap().database_type(),
        DatabaseType::Mssql
    );
}

#[tokio::test]
async fn existing_helper_is_passed_through() {
    let registry = HelperRegistry::new();
    let factory = RecordingFactory::new(Dialect::postgres());
    let recorder = factory.recorder();
    let mut helper = HelperPrototype::new(factory).new_helper();
    helper
        .open(
            &CancellationToken::new(),
            &DatabaseInfo::new(DatabaseType::Postgres, "host=db"),
        )
        .await
        .unwrap();

    let helper = new_helper(Some(helper), "unregistered", &registry).unwrap();
    assert!(helper.is_open());
    assert_eq!(recorder.opens(), 1);
}

#[tokio::test]
async fn minted_helpers_are_independent() {
    let registry = HelperRegistry::new();
    let factory = RecordingFactory::new(Dialect::sqlite());
    let recorder = factory.recorder();
    registry.register("app", HelperPrototype::new(factory));

    let info = DatabaseInfo::new(DatabaseType::Sqlite, ":memory:");
    let mut a = new_helper(None, "app", &registry).unwrap();
    let mut b = a.new_helper();
    a.open(&CancellationToken::new(), &info).await.unwrap();
    b.open(&CancellationToken::new(), &info).await.unwrap();

    a.begin().await.unwrap();
    assert!(a.in_transaction());
    assert!(!b.in_transaction());
    assert!(matches!(b.commit(None).await, Err(DataHelperError::NoTransaction)));
    assert_eq!(recorder.opens(), 2);
}

#[tokio::test]
async fn installed_no_rows_error_is_surfaced() {
    let registry = HelperRegistry::new();
    let factory = RecordingFactory::new(Dialect::postgres());
    let prototype = HelperPrototype::from_parts(Arc::new(factory), HelperSettings::default())
        .with_no_rows_error(CustomerNotFound);
    assert!(prototype.settings().no_rows.is_custom());
    registry.register("crm", prototype);

    let mut helper = new_helper(None, "crm", &registry).unwrap();
    helper
        .open(
            &CancellationToken::new(),
            &DatabaseInfo::new(DatabaseType::Postgres, "host=db"),
        )
        .await
        .unwrap();
    let err = helper
        .query_row("select name from customers where id = ?", &[SqlValue::Int(1)])
        .await
        .get::<String>()
        .unwrap_err();
    assert!(err.is_no_rows());
    assert_eq!(err.to_string(), "customer not found");
}
