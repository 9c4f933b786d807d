//! The same queries against the SQLite and CSV stores, plus export of the
//! published view.
mod common;

use std::io::Write;

use common::*;
use gasflow::{CsvStore, GroupBy, SqliteStore, SupplySelection};
use rusqlite::{params, Connection};

// ============================================================================
// HELPERS
// ============================================================================

fn write_sqlite(path: &std::path::Path) {
    let conn = Connection::open(path).unwrap();
    for table in lookup().all_table_identifiers() {
        conn.execute_batch(&format!(
            "CREATE TABLE {} (period_from TEXT, gas_energy REAL, gcv_value REAL);",
            table.relation_name()
        ))
        .unwrap();
    }
    for (table, volume) in [("table_RU_DE_CTWOT_ex_P1", 10.0), ("table_RU_PL_CTWOT_ex_P2", 10.0)] {
        for record in records(day(2022, 1, 1), &[volume; 7]) {
            conn.execute(
                &format!("INSERT INTO {table} VALUES (?1, ?2, ?3)"),
                params![
                    format!("{} 00:00:00", record.period_from.format("%Y-%m-%d")),
                    record.gas_energy,
                    record.gcv_value
                ],
            )
            .unwrap();
        }
    }
}

fn write_csv_dir(dir: &std::path::Path) {
    for table in lookup().all_table_identifiers() {
        let mut file = std::fs::File::create(dir.join(format!("{}.csv", table.as_str()))).unwrap();
        writeln!(file, "period_from,gas_energy,gcv_value").unwrap();
        if table.as_str().starts_with("RU_") {
            for record in records(day(2022, 1, 1), &[10.0; 7]) {
                writeln!(
                    file,
                    "{},{},{}",
                    record.period_from.format("%Y-%m-%d"),
                    record.gas_energy,
                    GCV
                )
                .unwrap();
            }
        }
    }
}

// ============================================================================
// SQLITE
// ============================================================================

#[test]
fn sqlite_store_groups_by_importer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flows.db");
    write_sqlite(&path);

    let engine = engine_over(SqliteStore::open(&path).unwrap());
    let filter = engine
        .filter()
        .start("2022-01-01")
        .end("2022-01-07")
        .group_by(GroupBy::Country)
        .build()
        .unwrap();
    let out = engine
        .supply_time(&filter, &SupplySelection::countries(Some("Russia"), None))
        .unwrap();

    assert_eq!(out.height(), 14);
    assert!(volumes(&out).iter().all(|v| *v == 10.0));
    assert_eq!(strings(&out, "period_from")[0], "2022-01-01");
}

#[test]
fn sqlite_store_respects_the_window() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flows.db");
    write_sqlite(&path);

    let engine = engine_over(SqliteStore::open(&path).unwrap());
    let filter = engine
        .filter()
        .start("2022-01-03")
        .end("2022-01-05")
        .group_by(GroupBy::Sum)
        .build()
        .unwrap();
    let out = engine
        .supply_time(&filter, &SupplySelection::countries(Some("Russia"), None))
        .unwrap();
    assert_eq!(volumes(&out), vec![20.0; 3]);
}

// ============================================================================
// CSV + EXPORT
// ============================================================================

#[test]
fn csv_store_sum_and_export() {
    let data = tempfile::tempdir().unwrap();
    write_csv_dir(data.path());

    let engine = engine_over(CsvStore::new(data.path()));
    let filter = engine
        .filter()
        .start("2022-01-01")
        .end("2022-01-07")
        .group_by(GroupBy::Sum)
        .build()
        .unwrap();
    let out = engine
        .supply_time(&filter, &SupplySelection::countries(Some("Russia"), None))
        .unwrap();
    assert_eq!(volumes(&out), vec![20.0; 7]);

    let export = data.path().join("view.csv");
    assert!(engine.results().export_csv(&export).unwrap());
    let text = std::fs::read_to_string(&export).unwrap();
    assert_eq!(text.lines().count(), 8);
    assert!(text.lines().next().unwrap().starts_with("period_from,period,volume"));
}

#[test]
fn comparison_export_is_flattened_with_flags() {
    let data = tempfile::tempdir().unwrap();
    write_csv_dir(data.path());

    let engine = engine_over(CsvStore::new(data.path()));
    let filter = engine.filter().end("2022-12-31").build().unwrap();
    let bundle = engine
        .supply_compare(&filter, &SupplySelection::countries(Some("Russia"), None), &[2022])
        .unwrap();
    assert_eq!(bundle.len(), 3);

    let frame = engine.results().latest_frame().unwrap().unwrap();
    assert_eq!(frame.height(), 7);
    assert!(strings(&frame, "flag").iter().all(|f| f == "2022"));
    assert_eq!(strings(&frame, "period_from")[0], "2022-01-01");
    assert!(frame.column("year").is_ok());

    let parquet = data.path().join("view.parquet");
    assert!(engine.results().export_parquet(&parquet).unwrap());
}
