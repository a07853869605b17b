#![cfg(feature = "sqlite")]

use datahelper_lite::prelude::*;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

async fn inventory() -> Result<DataHelper, DataHelperError> {
    let registry = HelperRegistry::with_defaults();
    let mut helper = new_helper(None, "sqlite", &registry)?;
    helper
        .open(
            &CancellationToken::new(),
            &DatabaseInfo::new(DatabaseType::Sqlite, ":memory:"),
        )
        .await?;
    helper
        .exec(
            "CREATE TABLE inventory (sku TEXT PRIMARY KEY, qty INTEGER, price REAL, note TEXT)",
            &[],
        )
        .await?;
    for (sku, qty, price, note) in [
        ("A-1", 4, 2.5, Some("fragile")),
        ("B-2", 0, 10.0, None),
        ("C-3", 12, 0.75, Some("bulk")),
    ] {
        helper
            .exec(
                "INSERT INTO inventory VALUES (?, ?, ?, ?)",
                &[
                    sku.into(),
                    SqlValue::Int(qty),
                    price.into(),
                    note.map_or(SqlValue::Null, SqlValue::from),
                ],
            )
            .await?;
    }
    Ok(helper)
}

#[tokio::test]
async fn scan_walks_every_record() -> Result<(), Box<dyn std::error::Error>> {
    let mut helper = inventory().await?;
    let mut rows = helper
        .query("SELECT sku, qty, price, note FROM inventory ORDER BY sku", &[])
        .await?;
    assert_eq!(rows.column_names(), vec!["sku", "qty", "price", "note"]);
    assert_eq!(rows.columns()[1].scan_type(), ScanType::Int);
    assert_eq!(rows.columns()[2].database_type_name(), "REAL");

    let mut seen = Vec::new();
    while rows.next() {
        let mut sku = String::new();
        let mut qty = 0_i64;
        let mut price = 0.0_f64;
        let mut note: Option<String> = None;
        rows.scan(&mut [&mut sku, &mut qty, &mut price, &mut note])?;
        seen.push((sku, qty, price, note));
    }
    assert!(rows.err().is_none());
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[1].3, None);
    assert_eq!(seen[2].0, "C-3");
    assert!((seen[2].2 - 0.75).abs() < f64::EPSILON);

    // exhausted cursors have no current record
    assert!(!rows.next());
    assert!(matches!(rows.get::<String>(0), Err(DataHelperError::NoCurrentRow)));
    rows.close();
    rows.close();
    assert!(matches!(rows.values(), Err(DataHelperError::CursorClosed)));
    Ok(())
}

#[tokio::test]
async fn scan_checks_width_and_types() -> Result<(), Box<dyn std::error::Error>> {
    let mut helper = inventory().await?;
    let mut rows = helper
        .query("SELECT sku, qty FROM inventory WHERE sku = ?", &["A-1".into()])
        .await?;
    assert!(matches!(
        rows.get::<String>(0),
        Err(DataHelperError::NoCurrentRow)
    ));
    assert!(rows.next());

    let mut only = String::new();
    assert!(matches!(
        rows.scan(&mut [&mut only]),
        Err(DataHelperError::ColumnCountMismatch { columns: 2, destinations: 1 })
    ));

    let mut sku = 0_i64;
    let mut qty = 0_i64;
    match rows.scan(&mut [&mut sku, &mut qty]) {
        Err(DataHelperError::TypeConversion { column, .. }) => assert_eq!(column, "sku"),
        other => panic!("expected a conversion error, got {other:?}"),
    }

    assert_eq!(rows.get_by_name::<i64>("qty")?, 4);
    assert_eq!(
        rows.raw_values()?,
        vec![Some(b"A-1".to_vec()), Some(b"4".to_vec())]
    );
    Ok(())
}

#[tokio::test]
async fn records_collect_into_maps_and_value_vectors() -> Result<(), Box<dyn std::error::Error>> {
    let mut helper = inventory().await?;
    let maps: Vec<Map<String, Value>> = helper
        .query_array("SELECT sku, note FROM inventory ORDER BY sku", &[])
        .await?;
    assert_eq!(maps[0]["sku"], "A-1");
    assert!(maps[1]["note"].is_null());

    let raw: Vec<Vec<SqlValue>> = helper
        .query_array("SELECT qty, price FROM inventory WHERE qty > ?", &[1.into()])
        .await?;
    assert_eq!(raw.len(), 2);
    assert_eq!(raw[0][0], SqlValue::Int(4));

    let notes: Vec<Option<String>> = helper
        .query_array("SELECT note FROM inventory ORDER BY sku", &[])
        .await?;
    assert_eq!(notes, vec![Some("fragile".to_owned()), None, Some("bulk".to_owned())]);
    Ok(())
}

#[tokio::test]
async fn single_record_lookups() -> Result<(), Box<dyn std::error::Error>> {
    let mut helper = inventory().await?;

    let row = helper
        .query_row("SELECT sku, qty FROM inventory WHERE qty = ?", &[12.into()])
        .await;
    assert!(row.err().is_none());
    let names: Vec<&str> = row.columns().unwrap_or_default().iter().map(Column::name).collect();
    assert_eq!(names, vec!["sku", "qty"]);
    let (sku, qty): (String, i64) = row.get()?;
    assert_eq!((sku.as_str(), qty), ("C-3", 12));

    let mut qty = 0_i64;
    let err = helper
        .query_row("SELECT qty FROM inventory WHERE sku = ?", &["Z-9".into()])
        .await
        .scan(&mut [&mut qty])
        .unwrap_err();
    assert!(err.is_no_rows());

    let err = helper
        .query_row("SELECT qty FROM missing_table", &[])
        .await
        .get::<i64>()
        .unwrap_err();
    assert!(matches!(err, DataHelperError::SqliteError(_)));
    Ok(())
}
