use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;

use super::{restrict_range, FlowStore};
use crate::error::FlowError;
use crate::schema::store as cols;
use crate::table_id::TableId;

/// Directory of `<table id>.csv` files, one per flow point.
#[derive(Debug, Clone)]
pub struct CsvStore {
    base_path: PathBuf,
}

impl CsvStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

/// Read a CSV with every column as String, trimming header whitespace.
pub(crate) fn read_csv_as_strings(path: &Path) -> Result<DataFrame, FlowError> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;
    Ok(df)
}

/// Strip whitespace and cast a string column to Float64.
pub(crate) fn parse_float(column: &str) -> Expr {
    col(column)
        .str()
        .strip_chars(lit(" \t\r\n"))
        .cast(DataType::Float64)
}

impl FlowStore for CsvStore {
    fn load(
        &self,
        table: &TableId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame, FlowError> {
        let path = self.base_path.join(format!("{}.csv", table.as_str()));
        if !path.is_file() {
            return Err(FlowError::MissingTable(table.to_string()));
        }

        let raw = read_csv_as_strings(&path)?;
        for required in [cols::PERIOD_FROM, cols::GAS_ENERGY] {
            if raw.column(required).is_err() {
                return Err(FlowError::MissingColumn(required.to_string()));
            }
        }

        let mut numeric = vec![parse_float(cols::GAS_ENERGY)];
        if raw.column(cols::GCV_VALUE).is_ok() {
            numeric.push(parse_float(cols::GCV_VALUE));
        }

        let parsed = raw
            .lazy()
            .with_columns(numeric)
            .with_columns([col(cols::PERIOD_FROM).str().strip_chars(lit(" \t\r\n"))])
            .collect()?;
        restrict_range(parsed, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_and_filters_csv() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("RU_DE_CTWOT_ex_P1.csv")).unwrap();
        writeln!(file, "period_from, gas_energy ,gcv_value").unwrap();
        writeln!(file, "2022-01-01,114000000,").unwrap();
        writeln!(file, "2022-01-02,105000000,10.5").unwrap();
        writeln!(file, "2022-02-01,1,1").unwrap();
        drop(file);

        let store = CsvStore::new(dir.path());
        let table: TableId = "RU_DE_CTWOT_ex_P1".parse().unwrap();
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2022, 1, 31).unwrap();
        let df = store.load(&table, start, end).unwrap();

        assert_eq!(df.height(), 2);
        let gcv = df.column(cols::GCV_VALUE).unwrap().f64().unwrap();
        assert_eq!(gcv.get(0), None);
        assert_eq!(gcv.get(1), Some(10.5));
    }

    #[test]
    fn missing_file_is_missing_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        let table: TableId = "RU_DE_CTWOT_ex_P1".parse().unwrap();
        let day = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        assert!(matches!(
            store.load(&table, day, day),
            Err(FlowError::MissingTable(_))
        ));
    }
}
