use std::path::Path;

use chrono::NaiveDate;
use parking_lot::Mutex;
use polars::prelude::*;
use rusqlite::{params, Connection, OpenFlags};
use tracing::debug;

use super::{iso, records_to_frame, DailyRecord, FlowStore};
use crate::error::FlowError;
use crate::table_id::TableId;

/// The dashboard's SQLite database: one `table_<id>` relation per point.
///
/// The connection is long-lived and shared across queries. Reads are plain
/// selects with no surrounding transaction, so sequential per-table reads of
/// one query do not see a common snapshot.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open an existing database read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn has_relation(conn: &Connection, name: &str) -> Result<bool, FlowError> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

impl FlowStore for SqliteStore {
    fn load(
        &self,
        table: &TableId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame, FlowError> {
        let relation = table.relation_name();
        let conn = self.conn.lock();

        if !Self::has_relation(&conn, &relation)? {
            return Err(FlowError::MissingTable(table.to_string()));
        }

        // Relation names come from a validated TableId: [A-Za-z0-9_] only.
        let sql = format!(
            "SELECT substr(period_from, 1, 10), gas_energy, gcv_value
             FROM \"{relation}\"
             WHERE substr(period_from, 1, 10) >= ?1
               AND substr(period_from, 1, 10) <= ?2
             ORDER BY period_from"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![iso(start), iso(end)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<f64>>(1)?,
                row.get::<_, Option<f64>>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (date, energy, gcv) = row?;
            let period_from = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|_| FlowError::InvalidDate(format!("{date} in {relation}")))?;
            records.push(DailyRecord::new(period_from, energy.unwrap_or(0.0), gcv));
        }

        debug!(table = %table, rows = records.len(), "sqlite read");
        records_to_frame(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::store as cols;

    fn seeded() -> SqliteStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE table_RU_DE_CTWOT_ex_P1 (period_from TEXT, gas_energy REAL, gcv_value REAL);
             INSERT INTO table_RU_DE_CTWOT_ex_P1 VALUES ('2022-01-01 00:00:00', 114000000, NULL);
             INSERT INTO table_RU_DE_CTWOT_ex_P1 VALUES ('2022-01-02 00:00:00', 105000000, 10.5);
             INSERT INTO table_RU_DE_CTWOT_ex_P1 VALUES ('2022-01-03 00:00:00', 1, 1);",
        )
        .unwrap();
        SqliteStore::from_connection(conn)
    }

    #[test]
    fn reads_range() {
        let store = seeded();
        let table: TableId = "RU_DE_CTWOT_ex_P1".parse().unwrap();
        let df = store
            .load(
                &table,
                NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2022, 1, 2).unwrap(),
            )
            .unwrap();
        assert_eq!(df.height(), 2);
        let dates = df.column(cols::PERIOD_FROM).unwrap().str().unwrap();
        assert_eq!(dates.get(1), Some("2022-01-02"));
    }

    #[test]
    fn unknown_relation_is_missing_table() {
        let store = seeded();
        let table: TableId = "NO_DE_CTWOT_ex_P3".parse().unwrap();
        let day = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        assert!(matches!(
            store.load(&table, day, day),
            Err(FlowError::MissingTable(_))
        ));
    }
}
