//! Integration tests for the ledger loader.

use chrono::{NaiveDate, TimeZone, Utc};
use finstat_core::{CategoryStore, Operation, OperationStore};
use finstat_loader::{load, save, LoadError};
use finstat_query::RateProvider;
use rust_decimal_macros::dec;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn write_ledger(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("ledger.json");
    fs::write(&path, content).unwrap();
    path
}

const LEDGER: &str = r#"{
  "options": { "title": "Household", "base_currency": "EUR" },
  "operations": [
    { "id": "e1", "date": "2024-01-15", "type": "expense",
      "account": "Cash", "currency": "USD", "amount": "42.50",
      "categories": [{ "category": "Food", "amount": "30" }, { "category": "Coffee", "amount": "12.50" }] },
    { "id": "t1", "date": "2024-01-16", "type": "transfer",
      "account": "Bank", "currency": "USD", "amount": "100",
      "to_account": "Cash", "to_currency": "USD", "to_amount": "100" },
    { "id": "e1", "date": "2024-01-15", "type": "expense",
      "account": "Cash", "currency": "USD", "amount": "40",
      "last_modified": "2024-01-20T10:00:00Z",
      "categories": [{ "category": "Food", "amount": "40" }] },
    { "id": "x1", "date": "2024-01-17", "type": "deleted" }
  ],
  "categories": [
    { "name": "Food", "currency": "USD", "goal": "3000" },
    { "name": "Coffee", "currency": "USD", "hidden": true }
  ],
  "rates": [
    { "date": "2024-01-01", "base": "EUR", "quote": "USD", "rate": "1.10" }
  ]
}"#;

#[tokio::test]
async fn test_load_ledger() {
    let dir = TempDir::new().unwrap();
    let path = write_ledger(&dir, LEDGER);

    let ledger = load(&path).unwrap();
    assert_eq!(ledger.options.title.as_deref(), Some("Household"));
    assert_eq!(ledger.options.base_currency, "EUR");
    assert_eq!(ledger.options.average_days, 30);
    assert_eq!(ledger.duplicates, 1);

    // Newer record wins for e1.
    let e1 = ledger.operations.get("e1").await.unwrap();
    assert_eq!(e1.amount(), dec!(40));
    assert_eq!(e1.category_amount("Food"), dec!(40));
    assert_eq!(
        e1.last_modified,
        Utc.with_ymd_and_hms(2024, 1, 20, 10, 0, 0).unwrap()
    );

    let all = ledger.operations.read_all().await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().any(Operation::is_deleted));

    let food = ledger.categories.get("Food").await.unwrap();
    assert_eq!(food.goal, Some(dec!(3000)));
    assert!(ledger.categories.get("Coffee").await.unwrap().hidden);

    let rate = ledger
        .rates
        .get_rate(date(2024, 2, 1), "USD", "EUR")
        .await
        .unwrap();
    assert!(rate > dec!(0.909) && rate < dec!(0.91));
}

#[tokio::test]
async fn test_save_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = write_ledger(&dir, LEDGER);
    let ledger = load(&path).unwrap();

    ledger
        .operations
        .write(vec![Operation::income(
            "i1",
            date(2024, 1, 31),
            "Bank",
            dec!(2500),
            "EUR",
        )])
        .await
        .unwrap();
    save(
        &path,
        &ledger.options,
        &ledger.operations,
        &ledger.categories,
        &ledger.rates,
    )
    .unwrap();

    let reloaded = load(&path).unwrap();
    assert_eq!(reloaded.duplicates, 0);
    assert_eq!(reloaded.options, ledger.options);
    assert_eq!(
        reloaded.operations.snapshot(),
        ledger.operations.snapshot()
    );
    assert_eq!(
        reloaded.categories.snapshot(),
        ledger.categories.snapshot()
    );
    assert_eq!(reloaded.rates.entries(), ledger.rates.entries());

    // Nothing but the ledger is left behind.
    let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
}

#[test]
fn test_missing_file() {
    let err = load(Path::new("/nonexistent/ledger.json")).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
}

#[test]
fn test_invalid_base_currency() {
    let dir = TempDir::new().unwrap();
    let path = write_ledger(&dir, r#"{ "options": { "base_currency": "dollars" } }"#);
    let err = load(&path).unwrap_err();
    assert!(matches!(err, LoadError::InvalidOption { ref option, .. } if option == "base_currency"));
}

#[test]
fn test_unknown_operation_type() {
    let dir = TempDir::new().unwrap();
    let path = write_ledger(
        &dir,
        r#"{ "operations": [{ "id": "r1", "date": "2024-01-01", "type": "refund" }] }"#,
    );
    assert!(matches!(load(&path).unwrap_err(), LoadError::Json { .. }));
}
