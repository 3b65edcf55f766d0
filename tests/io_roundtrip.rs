use std::fs;
use std::io::Write;

use clv::{
    assert_schema_compatible, build_output_schema, calculate, engineer_features, load_csv_table,
    load_sqlite_table, write_features_jsonl, write_schema_json, write_summary_csv, ClvConfig,
    LoadError, OutputKind, TableSchema, OUTPUT_SCHEMA_VERSION,
};
use rusqlite::{params, Connection};
use tempfile::{tempdir, NamedTempFile};

const RETAIL_CSV: &str = "\
InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country,Profit
536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,12/1/2010 8:26,2.55,17850,United Kingdom,15.30
536365,71053,WHITE METAL LANTERN,6,12/1/2010 8:26,3.39,17850,United Kingdom,20.34
536367,84879,ASSORTED COLOUR BIRD ORNAMENT,32,1/20/2011 8:34,1.69,13047,United Kingdom,54.08
536370,22728,ALARM CLOCK BAKELIKE PINK,24,1/25/2011 8:45,3.75,12583,France,90.00
536371,85123A,WHITE HANGING HEART T-LIGHT HOLDER,4,1/25/2011 9:00,2.55,17850,United Kingdom,10.20
";

fn write_temp_csv(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp csv file");
    file.write_all(body.as_bytes()).expect("write csv");
    file
}

#[test]
fn csv_calculate_round_trip() {
    let input = write_temp_csv(RETAIL_CSV);
    let table = load_csv_table(input.path()).expect("load csv");
    assert_eq!(table.len(), 5);

    let out = calculate(&table, &ClvConfig::default()).expect("calculate");
    // Global max is 2011-01-25 09:00, boundary 2010-12-26 09:00: every customer
    // bought after it.
    assert!(out.churned.is_empty());
    assert_eq!(out.active.len(), 3);

    let heart = out
        .active
        .iter()
        .find(|row| row.customer_id == "17850")
        .expect("17850 present");
    assert!((heart.total_profit - 45.84).abs() < 1e-9);
    assert_eq!(heart.lifetime_periods, 2);

    let dir = tempdir().expect("temp dir");
    let active_schema = build_output_schema(OutputKind::ActiveSummary);
    let churned_schema = build_output_schema(OutputKind::ChurnedSummary);
    write_summary_csv(&dir.path().join("active.csv"), &active_schema, &out.active)
        .expect("write active");
    write_summary_csv(&dir.path().join("churned.csv"), &churned_schema, &out.churned)
        .expect("write churned");

    let active_text = fs::read_to_string(dir.path().join("active.csv")).expect("read active");
    let mut lines = active_text.lines();
    assert_eq!(lines.next(), Some("CustomerID,Profit,Lifetime"));
    assert_eq!(lines.count(), 3);
    assert_eq!(
        fs::read_to_string(dir.path().join("churned.csv")).expect("read churned"),
        "CustomerID,CLV,Lifetime\n"
    );
}

#[test]
fn csv_features_round_trip_through_jsonl() {
    let input = write_temp_csv(RETAIL_CSV);
    let table = load_csv_table(input.path()).expect("load csv");
    let cfg = ClvConfig {
        churn_period: clv::ChurnPeriod::from_days(14).expect("valid period"),
        ..ClvConfig::default()
    };

    let out = engineer_features(&table, &cfg).expect("features");
    // Boundary is 2011-01-11 09:00, so 17850 (last 2011-01-25) stays active.
    let heart = out
        .active
        .iter()
        .find(|row| row.customer_id == "17850")
        .expect("17850 active");
    assert_eq!(heart.tx_count, 3);
    assert_eq!(heart.quantity_total, 16);
    assert_eq!(heart.lifetime_periods, 4);
    assert_eq!(heart.purchased_items.len(), 2);

    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("active.jsonl");
    write_features_jsonl(&path, &out.active).expect("write jsonl");

    let text = fs::read_to_string(&path).expect("read jsonl");
    assert_eq!(text.lines().count(), out.active.len());
    let parsed: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid json line"))
        .collect();
    let heart_json = parsed
        .iter()
        .find(|value| value["CustomerID"] == "17850")
        .expect("17850 line");
    assert_eq!(heart_json["Txs_by_period"]["1"], 2);
    assert_eq!(heart_json["Txs_by_period"]["4"], 1);
    assert!(heart_json.get("CLV").is_none());
    assert!(heart_json.get("Profit").is_some());
}

#[test]
fn schema_file_lists_both_sides() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("schema.json");
    let schemas = [
        build_output_schema(OutputKind::ChurnedFeatures),
        build_output_schema(OutputKind::ActiveFeatures),
    ];
    write_schema_json(&path, &schemas).expect("write schema");

    let loaded: Vec<TableSchema> =
        serde_json::from_str(&fs::read_to_string(&path).expect("read schema")).expect("parse");
    assert_eq!(loaded.len(), 2);
    assert_schema_compatible(OUTPUT_SCHEMA_VERSION, &schemas[0].fingerprint, &loaded[0])
        .expect("churned schema matches");
    assert_eq!(loaded[1].kind, OutputKind::ActiveFeatures);
}

#[test]
fn sqlite_table_feeds_the_same_pipeline() {
    let file = NamedTempFile::new().expect("temp sqlite file");
    let conn = Connection::open(file.path()).expect("open sqlite");
    conn.execute_batch(
        "
        CREATE TABLE transactions (
            CustomerID INTEGER NOT NULL,
            InvoiceDate TEXT NOT NULL,
            Profit REAL NOT NULL,
            Quantity INTEGER NOT NULL,
            StockCode TEXT,
            Note TEXT
        );
        ",
    )
    .expect("create schema");

    let rows: [(i64, &str, f64, i64, Option<&str>); 4] = [
        (12346, "2011-01-18 10:01:00", 77.18, 1, Some("23166")),
        (12346, "2011-03-18 10:17:00", 12.0, 2, Some("23166")),
        (12347, "2011-05-01 09:00:00", 25.5, 12, Some("85116")),
        (12347, "2011-05-20 14:30:00", 4.5, 3, None),
    ];
    for (customer, date, profit, quantity, stock) in rows {
        conn.execute(
            "INSERT INTO transactions (CustomerID, InvoiceDate, Profit, Quantity, StockCode, Note)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
            params![customer, date, profit, quantity, stock],
        )
        .expect("insert row");
    }
    drop(conn);

    let table = load_sqlite_table(file.path(), "transactions").expect("load sqlite");
    assert_eq!(table.len(), 4);
    assert_eq!(table.rows()[3][4], "");

    let out = calculate(&table, &ClvConfig::default()).expect("calculate");
    // Boundary is 2011-04-20 14:30.
    assert_eq!(out.churned.len(), 1);
    assert_eq!(out.churned[0].customer_id, "12346");
    assert!((out.churned[0].clv - 89.18).abs() < 1e-9);
    assert_eq!(out.churned[0].lifetime_periods, 2);
    assert_eq!(out.active[0].customer_id, "12347");

    let features = engineer_features(&table, &ClvConfig::default()).expect("features");
    let active = &features.active[0];
    assert!(active.purchased_items.contains("85116"));
    assert!(active.purchased_items.contains(""));
}

#[test]
fn missing_csv_file_is_an_io_error() {
    let dir = tempdir().expect("temp dir");
    let err = load_csv_table(&dir.path().join("absent.csv")).expect_err("must fail");
    assert!(matches!(err, LoadError::Io { .. }));
}
