//! Read side of the relational store: one relation per flow-point table,
//! each with at least `period_from`, `gas_energy` and `gcv_value`.

mod csv;
mod memory;
mod sqlite;

pub use self::csv::CsvStore;
pub(crate) use self::csv::{parse_float, read_csv_as_strings};
pub use self::memory::MemoryStore;
pub use self::sqlite::SqliteStore;

use chrono::NaiveDate;
use polars::prelude::*;

use crate::error::FlowError;
use crate::schema::store as cols;
use crate::table_id::TableId;

/// Source of raw daily observations.
///
/// Implementations return a frame with the columns in [`cols::ALL`]:
/// `period_from` as an ISO date string, `gas_energy` and `gcv_value` as
/// Float64 (`gcv_value` nullable), restricted to `start..=end`.
pub trait FlowStore: Send + Sync {
    fn load(&self, table: &TableId, start: NaiveDate, end: NaiveDate)
        -> Result<DataFrame, FlowError>;
}

/// One daily observation of a flow point.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRecord {
    pub period_from: NaiveDate,
    /// Energy in kWh.
    pub gas_energy: f64,
    pub gcv_value: Option<f64>,
}

impl DailyRecord {
    pub fn new(period_from: NaiveDate, gas_energy: f64, gcv_value: Option<f64>) -> Self {
        Self {
            period_from,
            gas_energy,
            gcv_value,
        }
    }
}

pub(crate) fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn records_to_frame(records: &[DailyRecord]) -> Result<DataFrame, FlowError> {
    let dates: Vec<String> = records.iter().map(|r| iso(r.period_from)).collect();
    let energy: Vec<f64> = records.iter().map(|r| r.gas_energy).collect();
    let gcv: Vec<Option<f64>> = records.iter().map(|r| r.gcv_value).collect();

    Ok(df!(
        cols::PERIOD_FROM => dates,
        cols::GAS_ENERGY => energy,
        cols::GCV_VALUE => gcv,
    )?)
}

/// Normalize dtypes and apply the inclusive date filter.
///
/// `period_from` may carry a time part (`2022-01-07 00:00:00`), so the upper
/// bound is compared exclusively against the following day.
pub(crate) fn restrict_range(
    frame: DataFrame,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<DataFrame, FlowError> {
    for required in [cols::PERIOD_FROM, cols::GAS_ENERGY] {
        if frame.column(required).is_err() {
            return Err(FlowError::MissingColumn(required.to_string()));
        }
    }

    let gcv = if frame.column(cols::GCV_VALUE).is_ok() {
        col(cols::GCV_VALUE).cast(DataType::Float64)
    } else {
        lit(NULL).cast(DataType::Float64).alias(cols::GCV_VALUE)
    };

    let upper = end.succ_opt().map(iso).unwrap_or_else(|| iso(end));

    let df = frame
        .lazy()
        .select([
            col(cols::PERIOD_FROM).cast(DataType::String),
            col(cols::GAS_ENERGY).cast(DataType::Float64),
            gcv,
        ])
        .filter(
            col(cols::PERIOD_FROM)
                .gt_eq(lit(iso(start)))
                .and(col(cols::PERIOD_FROM).lt(lit(upper))),
        )
        .sort([cols::PERIOD_FROM], SortMultipleOptions::default())
        .collect()?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, day).unwrap()
    }

    #[test]
    fn range_is_inclusive_and_tolerates_time_part() {
        let frame = df!(
            cols::PERIOD_FROM => ["2022-01-01", "2022-01-02 00:00:00", "2022-01-03", "2022-01-04"],
            cols::GAS_ENERGY => [1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();

        let out = restrict_range(frame, d(2), d(3)).unwrap();
        let energy: Vec<f64> = out
            .column(cols::GAS_ENERGY)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(energy, vec![2.0, 3.0]);
        assert_eq!(out.column(cols::GCV_VALUE).unwrap().null_count(), 2);
    }

    #[test]
    fn missing_energy_column_is_reported() {
        let frame = df!(cols::PERIOD_FROM => ["2022-01-01"]).unwrap();
        assert!(matches!(
            restrict_range(frame, d(1), d(2)),
            Err(FlowError::MissingColumn(_))
        ));
    }
}
