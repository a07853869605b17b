use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::*;
use crate::results::{Column, ResultSet, ScanType};
use crate::test_utils::{Recorder, RecordingFactory};

fn helper_with(dialect: Dialect) -> (DataHelper, Recorder) {
    let factory = RecordingFactory::new(dialect);
    let recorder = factory.recorder();
    (
        DataHelper::new(Arc::new(factory), HelperSettings::default()),
        recorder,
    )
}

async fn opened(dialect: Dialect, info: DatabaseInfo) -> (DataHelper, Recorder) {
    let (mut helper, recorder) = helper_with(dialect);
    helper
        .open(&CancellationToken::new(), &info)
        .await
        .unwrap();
    (helper, recorder)
}

async fn opened_pg() -> (DataHelper, Recorder) {
    opened(
        Dialect::postgres(),
        DatabaseInfo::new(DatabaseType::Postgres, "host=localhost"),
    )
    .await
}

fn count_result(n: i64) -> ResultSet {
    let mut rs = ResultSet::default();
    rs.set_columns(vec![Column::new("count", "INT8", ScanType::Int)]);
    rs.add_row_values(vec![SqlValue::Int(n)]).unwrap();
    rs
}

#[tokio::test]
async fn operations_before_open_fail() {
    let (mut helper, _) = helper_with(Dialect::sqlite());
    assert!(matches!(helper.begin().await, Err(DataHelperError::NoConnection)));
    assert!(matches!(
        helper.exec("delete from t", &[]).await,
        Err(DataHelperError::NoConnection)
    ));
    assert!(matches!(
        helper.query_row("select 1", &[]).await.get::<i64>(),
        Err(DataHelperError::NoConnection)
    ));
    assert!(helper.close().await.is_ok());
}

#[tokio::test]
async fn open_requires_connection_string() {
    let (mut helper, _) = helper_with(Dialect::sqlite());
    let info = DatabaseInfo::new(DatabaseType::Sqlite, "  ");
    assert!(matches!(
        helper.open(&CancellationToken::new(), &info).await,
        Err(DataHelperError::NoConnectionString)
    ));
    assert!(!helper.is_open());
}

#[tokio::test]
async fn open_honours_cancellation() {
    let (mut helper, recorder) = helper_with(Dialect::sqlite());
    recorder.set_open_delay(Duration::from_secs(30));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let info = DatabaseInfo::new(DatabaseType::Sqlite, ":memory:");
    assert!(matches!(
        helper.open(&cancel, &info).await,
        Err(DataHelperError::Cancelled(_))
    ));
    assert!(!helper.is_open());
}

#[tokio::test]
async fn open_times_out() {
    let (mut helper, recorder) = helper_with(Dialect::sqlite());
    recorder.set_open_delay(Duration::from_secs(30));
    let info = DatabaseInfo::builder(DatabaseType::Sqlite)
        .connection_string(":memory:")
        .open_timeout_ms(20)
        .finish();
    assert!(matches!(
        helper.open(&CancellationToken::new(), &info).await,
        Err(DataHelperError::ConnectionError(_))
    ));
}

#[tokio::test]
async fn statements_are_templated_for_the_dialect() {
    let info = DatabaseInfo::builder(DatabaseType::Postgres)
        .connection_string("host=localhost")
        .schema("tenant")
        .finish();
    let (mut helper, recorder) = opened(Dialect::postgres(), info).await;
    helper
        .exec(
            "update {orders} set status = ? where id = ?",
            &["shipped".into(), 4_i64.into()],
        )
        .await
        .unwrap();
    assert_eq!(
        recorder.statements(),
        vec!["update tenant.orders set status = $1 where id = $2"]
    );
}

#[tokio::test]
async fn begin_twice_keeps_one_transaction() {
    let (mut helper, recorder) = opened_pg().await;
    helper.begin().await.unwrap();
    helper.begin().await.unwrap();
    assert!(helper.in_transaction());
    helper.commit(None).await.unwrap();
    assert!(!helper.in_transaction());
    assert_eq!(recorder.statements(), vec!["BEGIN", "COMMIT"]);
}

#[tokio::test]
async fn commit_or_rollback_without_begin_fails() {
    let (mut helper, recorder) = opened_pg().await;
    assert!(matches!(helper.commit(None).await, Err(DataHelperError::NoTransaction)));
    assert!(matches!(helper.rollback(None).await, Err(DataHelperError::NoTransaction)));
    assert!(recorder.statements().is_empty());
}

#[tokio::test]
async fn mark_then_discard_then_discard_again() {
    let (mut helper, recorder) = opened_pg().await;
    helper.begin().await.unwrap();
    helper.mark("sp1").await.unwrap();
    helper.discard("sp1").await.unwrap();
    assert!(matches!(
        helper.discard("sp1").await,
        Err(DataHelperError::SavepointNotFound(name)) if name == "sp1"
    ));
    assert_eq!(
        recorder.statements(),
        vec!["BEGIN", "SAVEPOINT sp1", "RELEASE SAVEPOINT sp1"]
    );
}

#[tokio::test]
async fn savepoints_need_a_transaction_and_valid_names() {
    let (mut helper, _) = opened_pg().await;
    assert!(matches!(helper.mark("sp1").await, Err(DataHelperError::NoTransaction)));
    helper.begin().await.unwrap();
    assert!(matches!(
        helper.mark("sp1; drop table t").await,
        Err(DataHelperError::InvalidIdentifier(_))
    ));
    helper.mark("sp1").await.unwrap();
    assert!(matches!(
        helper.mark("sp1").await,
        Err(DataHelperError::DuplicateSavepoint(_))
    ));
}

#[tokio::test]
async fn save_moves_an_existing_savepoint() {
    let (mut helper, recorder) = opened_pg().await;
    helper.begin().await.unwrap();
    helper.save("a").await.unwrap();
    helper.mark("b").await.unwrap();
    helper.save("a").await.unwrap();
    assert_eq!(helper.savepoints(), ["a".to_owned()]);
    assert_eq!(
        recorder.statements()[1..],
        [
            "SAVEPOINT a".to_owned(),
            "SAVEPOINT b".to_owned(),
            "RELEASE SAVEPOINT a".to_owned(),
            "SAVEPOINT a".to_owned(),
        ]
    );
}

#[tokio::test]
async fn discard_releases_newer_savepoints() {
    let (mut helper, _) = opened_pg().await;
    helper.begin().await.unwrap();
    for name in ["a", "b", "c"] {
        helper.mark(name).await.unwrap();
    }
    helper.discard("b").await.unwrap();
    assert_eq!(helper.savepoints(), ["a".to_owned()]);
    helper.mark("b").await.unwrap();
    helper.rollback_to("a").await.unwrap();
    assert_eq!(helper.savepoints(), ["a".to_owned()]);
}

#[tokio::test]
async fn mssql_discard_has_no_release_statement() {
    let info = DatabaseInfo::new(DatabaseType::Mssql, "server=db");
    let (mut helper, recorder) = opened(Dialect::mssql(), info).await;
    helper.begin().await.unwrap();
    helper.mark("sp1").await.unwrap();
    helper.discard("sp1").await.unwrap();
    assert_eq!(
        recorder.statements(),
        vec!["BEGIN TRANSACTION", "SAVE TRANSACTION sp1"]
    );
}

#[tokio::test]
async fn deferred_rollback_after_commit_is_a_no_op() {
    let (mut helper, recorder) = opened_pg().await;
    let token = helper.begin_dr().await.unwrap();
    assert!(!token.is_empty());
    helper.commit(Some(&token)).await.unwrap();
    helper.rollback(Some(&token)).await.unwrap();
    assert_eq!(recorder.statements(), vec!["BEGIN", "COMMIT"]);
}

#[tokio::test]
async fn deferred_rollback_undoes_an_unfinished_transaction() {
    let (mut helper, recorder) = opened_pg().await;
    let token = helper.begin_dr().await.unwrap();
    helper.exec("insert into t values (1)", &[]).await.unwrap();
    helper.rollback(Some(&token)).await.unwrap();
    assert!(!helper.in_transaction());
    assert_eq!(
        recorder.statements(),
        vec!["BEGIN", "insert into t values (1)", "ROLLBACK"]
    );
}

#[tokio::test]
async fn committed_tokens_do_not_accumulate() {
    let (mut helper, _) = opened_pg().await;
    let mut tokens = Vec::new();
    for _ in 0..1000 {
        let token = helper.begin_dr().await.unwrap();
        helper.commit(Some(&token)).await.unwrap();
        tokens.push(token);
    }
    assert!(helper.tx.outstanding_tokens() <= 2);

    let last = tokens.pop().unwrap();
    helper.rollback(Some(&last)).await.unwrap();
    assert!(matches!(
        helper.rollback(Some(&tokens[0])).await,
        Err(DataHelperError::UnknownTransactionToken(_))
    ));
}

#[tokio::test]
async fn tokens_are_distinct_and_joined_commits_leave_the_outer_open() {
    let (mut helper, recorder) = opened_pg().await;
    let outer = helper.begin_dr().await.unwrap();
    let inner = helper.begin_dr().await.unwrap();
    assert_ne!(outer, inner);
    helper.commit(Some(&inner)).await.unwrap();
    assert!(helper.in_transaction());
    helper.rollback(Some(&inner)).await.unwrap();
    assert!(helper.in_transaction(), "released joined token must not roll back the outer");
    helper.commit(Some(&outer)).await.unwrap();
    assert!(!helper.in_transaction());
    assert_eq!(recorder.statements(), vec!["BEGIN", "COMMIT"]);
}

#[tokio::test]
async fn token_resolves_after_a_later_transaction_starts() {
    let (mut helper, recorder) = opened_pg().await;
    let first = helper.begin_dr().await.unwrap();
    helper.commit(None).await.unwrap();
    helper.begin().await.unwrap();
    helper.rollback(Some(&first)).await.unwrap();
    assert!(helper.in_transaction(), "stale token must not touch the new transaction");
    assert_eq!(recorder.statements(), vec!["BEGIN", "COMMIT", "BEGIN"]);
}

#[tokio::test]
async fn unknown_tokens_are_rejected() {
    let (mut helper, _) = opened_pg().await;
    assert!(matches!(
        helper.rollback(Some("tx_bogus")).await,
        Err(DataHelperError::UnknownTransactionToken(_))
    ));
    assert!(matches!(
        helper.commit(Some("tx_bogus")).await,
        Err(DataHelperError::UnknownTransactionToken(_))
    ));
}

#[tokio::test]
async fn failed_commit_keeps_the_transaction() {
    let (mut helper, recorder) = opened_pg().await;
    helper.begin().await.unwrap();
    recorder.fail_next("serialization failure");
    assert!(helper.commit(None).await.is_err());
    assert!(helper.in_transaction());
    helper.rollback(None).await.unwrap();
}

#[tokio::test]
async fn close_rolls_back_an_open_transaction() {
    let (mut helper, recorder) = opened_pg().await;
    let token = helper.begin_dr().await.unwrap();
    helper.close().await.unwrap();
    assert!(!helper.is_open());
    assert_eq!(recorder.statements(), vec!["BEGIN", "ROLLBACK"]);
    helper.rollback(Some(&token)).await.unwrap();
}

#[tokio::test]
async fn paged_queries_need_a_pager() {
    let (mut helper, recorder) = opened_pg().await;
    assert!(matches!(
        helper.query_paged(None, "select * from t", &[]).await,
        Err(DataHelperError::NoPagerConfigured)
    ));
    assert!(
        helper
            .query_paged(Some(&PageParams::new(1, 0)), "select * from t", &[])
            .await
            .is_err()
    );
    helper
        .query_paged(Some(&PageParams::new(2, 50)), "select * from {t} order by id", &[])
        .await
        .unwrap();
    assert_eq!(
        recorder.statements(),
        vec!["select * from t order by id LIMIT 50 OFFSET 50"]
    );
}

#[tokio::test]
async fn next_requires_an_output_variable() {
    let (mut helper, recorder) = opened_pg().await;
    assert!(matches!(
        helper.next("order_seq", None).await,
        Err(DataHelperError::VariableNotInitialized)
    ));
    recorder.push_result(count_result(41));
    let mut value = 0_i64;
    helper.next("public.order_seq", Some(&mut value)).await.unwrap();
    assert_eq!(value, 41);
    assert_eq!(recorder.statements(), vec!["SELECT nextval('public.order_seq')"]);
}

#[tokio::test]
async fn next_is_unsupported_without_sequences() {
    let info = DatabaseInfo::new(DatabaseType::Sqlite, ":memory:");
    let (mut helper, _) = opened(Dialect::sqlite(), info).await;
    let mut value = 0_i64;
    assert!(matches!(
        helper.next("seq", Some(&mut value)).await,
        Err(DataHelperError::Unsupported(_))
    ));
}

#[tokio::test]
async fn verify_within_builds_a_count_query() {
    let (mut helper, recorder) = opened_pg().await;
    recorder.push_result(count_result(1));
    let valid = helper
        .verify_within(
            "customers",
            &[
                VerifyExpression::eq("code", "C-1"),
                VerifyExpression::new("deleted_at", SqlValue::Null, ""),
                VerifyExpression::new("name", "Ac%", "like"),
            ],
        )
        .await
        .unwrap();
    assert!(valid);
    assert_eq!(
        recorder.statements(),
        vec![
            "SELECT COUNT(*) FROM customers WHERE code = $1 AND deleted_at IS NULL AND name LIKE $2"
        ]
    );
    assert_eq!(
        recorder.last_params().unwrap(),
        vec![SqlValue::Text("C-1".into()), SqlValue::Text("Ac%".into())]
    );

    recorder.push_result(count_result(0));
    let valid = helper
        .verify_within("customers", &[VerifyExpression::eq("code", "nope")])
        .await
        .unwrap();
    assert!(!valid);
}

#[tokio::test]
async fn verify_within_rejects_unsafe_input() {
    let (mut helper, _) = opened_pg().await;
    assert!(helper.verify_within("customers", &[]).await.unwrap());
    assert!(matches!(
        helper
            .verify_within("customers", &[VerifyExpression::new("code", "x", "; drop")])
            .await,
        Err(DataHelperError::InvalidOperator(_))
    ));
    assert!(matches!(
        helper
            .verify_within("customers", &[VerifyExpression::eq("code = 1 or 1", 1_i64)])
            .await,
        Err(DataHelperError::InvalidIdentifier(_))
    ));
    assert!(matches!(
        helper
            .verify_within("customers", &[VerifyExpression::new("code", SqlValue::Null, ">")])
            .await,
        Err(DataHelperError::InvalidOperator(_))
    ));
}

#[tokio::test]
async fn query_row_uses_the_configured_sentinel() {
    #[derive(Debug)]
    struct NotFound;
    impl fmt::Display for NotFound {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("record not found")
        }
    }
    impl std::error::Error for NotFound {}

    let factory = RecordingFactory::new(Dialect::sqlite());
    let proto = HelperPrototype::new(factory).with_no_rows_error(NotFound);
    let mut helper = proto.new_helper();
    helper
        .open(
            &CancellationToken::new(),
            &DatabaseInfo::new(DatabaseType::Sqlite, ":memory:"),
        )
        .await
        .unwrap();
    let err = helper.query_row("select 1", &[]).await.get::<i64>().unwrap_err();
    assert!(err.is_no_rows());
    assert_eq!(err.to_string(), "record not found");

    let sibling = helper.new_helper();
    assert!(!sibling.is_open());
    assert!(sibling.settings.no_rows.is_custom());
}

#[test]
fn escape_doubles_single_quotes() {
    let (helper, _) = helper_with(Dialect::sqlite());
    assert_eq!(helper.escape("O'Brien's"), "O''Brien''s");
    assert_eq!(helper.escape("plain"), "plain");
}
