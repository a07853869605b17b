#![cfg(feature = "sqlite")]

use datahelper_lite::prelude::*;
use tokio_util::sync::CancellationToken;

async fn ledger() -> Result<DataHelper, DataHelperError> {
    let registry = HelperRegistry::with_defaults();
    let mut helper = new_helper(None, "sqlite", &registry)?;
    let info = DatabaseInfo::new(DatabaseType::Sqlite, ":memory:");
    helper.open(&CancellationToken::new(), &info).await?;
    helper
        .exec("CREATE TABLE ledger (id INTEGER PRIMARY KEY, amount INTEGER NOT NULL)", &[])
        .await?;
    Ok(helper)
}

async fn insert(helper: &mut DataHelper, id: i64) -> Result<(), DataHelperError> {
    helper
        .exec("INSERT INTO ledger (id, amount) VALUES (?, ?)", &[id.into(), (id * 10).into()])
        .await
        .map(|_| ())
}

async fn ids(helper: &mut DataHelper) -> Result<Vec<i64>, DataHelperError> {
    helper.query_array("SELECT id FROM ledger ORDER BY id", &[]).await
}

#[tokio::test]
async fn commit_persists_and_rollback_discards() -> Result<(), Box<dyn std::error::Error>> {
    let mut helper = ledger().await?;

    helper.begin().await?;
    insert(&mut helper, 1).await?;
    helper.commit(None).await?;

    helper.begin().await?;
    insert(&mut helper, 2).await?;
    helper.rollback(None).await?;

    assert_eq!(ids(&mut helper).await?, vec![1]);
    assert!(!helper.in_transaction());
    assert!(matches!(helper.commit(None).await, Err(DataHelperError::NoTransaction)));
    Ok(())
}

#[tokio::test]
async fn rollback_to_keeps_earlier_work() -> Result<(), Box<dyn std::error::Error>> {
    let mut helper = ledger().await?;
    helper.begin().await?;
    insert(&mut helper, 1).await?;
    helper.mark("first").await?;
    insert(&mut helper, 2).await?;
    helper.mark("second").await?;
    insert(&mut helper, 3).await?;

    helper.rollback_to("first").await?;
    assert_eq!(helper.savepoints(), ["first"]);
    assert_eq!(ids(&mut helper).await?, vec![1]);

    // the savepoint survives and can be rolled back to again
    insert(&mut helper, 4).await?;
    helper.rollback_to("first").await?;
    helper.commit(None).await?;
    assert_eq!(ids(&mut helper).await?, vec![1]);
    Ok(())
}

#[tokio::test]
async fn save_moves_checkpoint_forward() -> Result<(), Box<dyn std::error::Error>> {
    let mut helper = ledger().await?;
    helper.begin().await?;
    helper.save("checkpoint").await?;
    insert(&mut helper, 1).await?;
    helper.mark("inner").await?;
    helper.save("checkpoint").await?;
    assert_eq!(helper.savepoints(), ["checkpoint"]);

    insert(&mut helper, 2).await?;
    helper.rollback_to("checkpoint").await?;
    helper.commit(None).await?;
    assert_eq!(ids(&mut helper).await?, vec![1]);
    Ok(())
}

#[tokio::test]
async fn discard_releases_and_rejects_unknown_names() -> Result<(), Box<dyn std::error::Error>> {
    let mut helper = ledger().await?;
    helper.begin().await?;
    helper.mark("a").await?;
    helper.mark("b").await?;
    assert!(matches!(
        helper.mark("a").await,
        Err(DataHelperError::DuplicateSavepoint(name)) if name == "a"
    ));

    helper.discard("a").await?;
    assert!(helper.savepoints().is_empty());
    assert!(matches!(
        helper.discard("b").await,
        Err(DataHelperError::SavepointNotFound(_))
    ));
    assert!(matches!(
        helper.mark("bad name; drop table ledger").await,
        Err(DataHelperError::InvalidIdentifier(_))
    ));
    helper.rollback(None).await?;
    assert!(ids(&mut helper).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn deferred_rollback_after_commit_is_harmless() -> Result<(), Box<dyn std::error::Error>> {
    let mut helper = ledger().await?;

    let token = helper.begin_dr().await?;
    insert(&mut helper, 1).await?;
    helper.commit(Some(&token)).await?;
    helper.rollback(Some(&token)).await?;
    assert_eq!(ids(&mut helper).await?, vec![1]);

    let token = helper.begin_dr().await?;
    insert(&mut helper, 2).await?;
    // an error path that never reaches commit
    helper.rollback(Some(&token)).await?;
    assert_eq!(ids(&mut helper).await?, vec![1]);
    Ok(())
}

#[tokio::test]
async fn joined_scope_commits_with_outer() -> Result<(), Box<dyn std::error::Error>> {
    let mut helper = ledger().await?;

    let outer = helper.begin_dr().await?;
    insert(&mut helper, 1).await?;

    let inner = helper.begin_dr().await?;
    insert(&mut helper, 2).await?;
    helper.commit(Some(&inner)).await?;
    helper.rollback(Some(&inner)).await?;
    assert!(helper.in_transaction());

    helper.commit(Some(&outer)).await?;
    helper.rollback(Some(&outer)).await?;
    assert_eq!(ids(&mut helper).await?, vec![1, 2]);

    assert!(matches!(
        helper.rollback(Some("tx_unknown")).await,
        Err(DataHelperError::UnknownTransactionToken(_))
    ));
    Ok(())
}

#[tokio::test]
async fn close_rolls_back_open_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ledger.db");
    let info = DatabaseInfo::new(DatabaseType::Sqlite, path.to_string_lossy());
    let registry = HelperRegistry::with_defaults();
    let mut helper = new_helper(None, "sqlite", &registry)?;

    helper.open(&CancellationToken::new(), &info).await?;
    helper
        .exec("CREATE TABLE ledger (id INTEGER PRIMARY KEY, amount INTEGER NOT NULL)", &[])
        .await?;
    helper.begin().await?;
    insert(&mut helper, 7).await?;
    helper.close().await?;

    helper.open(&CancellationToken::new(), &info).await?;
    assert!(ids(&mut helper).await?.is_empty());
    helper.close().await?;
    Ok(())
}
