//! Temperature and demand-forecast files merged onto demand series.

use std::path::PathBuf;

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{debug, warn};

use crate::aggregate::{GroupSpec, Reduction};
use crate::error::FlowError;
use crate::fetch::parse_period;
use crate::granularity::{Granularity, Locale};
use crate::schema::{flow, weather};
use crate::store::{parse_float, read_csv_as_strings};

const ROW: &str = "_row";

/// Per-country CSV files in one directory:
/// `<CODE>_temperature.csv` (`date,temperature`) and
/// `<CODE>_forecast.csv` (`date,forecast`).
#[derive(Debug, Clone)]
pub struct WeatherSource {
    base_path: PathBuf,
}

/// Date range and bucketing the weather columns are aligned to.
#[derive(Debug, Clone, Copy)]
pub struct WeatherWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub granularity: Granularity,
    pub locale: Locale,
}

impl WeatherSource {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn temperature(
        &self,
        code: &str,
        window: &WeatherWindow,
    ) -> Result<Option<DataFrame>, FlowError> {
        self.bucketed(code, weather::TEMPERATURE, Reduction::Mean, window)
    }

    pub fn forecast(
        &self,
        code: &str,
        window: &WeatherWindow,
    ) -> Result<Option<DataFrame>, FlowError> {
        self.bucketed(code, weather::FORECAST, Reduction::Sum, window)
    }

    /// Left-join temperature and forecast onto `series` by period label.
    ///
    /// A missing file yields a null column rather than an error.
    pub fn merge(
        &self,
        series: DataFrame,
        code: &str,
        window: &WeatherWindow,
    ) -> Result<DataFrame, FlowError> {
        if series.height() == 0 {
            return Ok(series);
        }

        let mut merged = series.with_row_index(ROW.into(), None)?.lazy();
        for (value, part) in [
            (weather::TEMPERATURE, self.temperature(code, window)?),
            (weather::FORECAST, self.forecast(code, window)?),
        ] {
            merged = match part {
                Some(frame) => merged.join(
                    frame.lazy(),
                    [col(flow::PERIOD)],
                    [col(flow::PERIOD)],
                    JoinArgs::new(JoinType::Left),
                ),
                None => merged.with_columns([lit(NULL).cast(DataType::Float64).alias(value)]),
            };
        }

        let out = merged.sort([ROW], SortMultipleOptions::default()).collect()?;
        Ok(out.drop(ROW)?)
    }

    /// Read one file, keep the window, reduce per period bucket.
    fn bucketed(
        &self,
        code: &str,
        value: &str,
        reduction: Reduction,
        window: &WeatherWindow,
    ) -> Result<Option<DataFrame>, FlowError> {
        let path = self.base_path.join(format!("{code}_{value}.csv"));
        if !path.is_file() {
            warn!(path = %path.display(), "weather file not found");
            return Ok(None);
        }

        let raw = read_csv_as_strings(&path)?;
        for required in [weather::DATE, value] {
            if raw.column(required).is_err() {
                return Err(FlowError::MissingColumn(format!("{required} in {}", path.display())));
            }
        }
        let parsed = raw
            .lazy()
            .select([col(weather::DATE).str().strip_chars(lit(" \t\r\n")), parse_float(value)])
            .collect()?;

        let mut labels = Vec::with_capacity(parsed.height());
        let mut values = Vec::with_capacity(parsed.height());
        {
            let dates = parsed.column(weather::DATE)?.str()?;
            let numbers = parsed.column(value)?.f64()?;
            for i in 0..parsed.height() {
                let Some(raw_date) = dates.get(i) else {
                    continue;
                };
                let date = parse_period(raw_date)?;
                if date < window.start || date > window.end {
                    continue;
                }
                labels.push(window.granularity.bucket(date, window.locale).label);
                values.push(numbers.get(i));
            }
        }

        let daily = df!(
            flow::PERIOD => labels,
            value => values,
        )?;
        let spec = GroupSpec {
            keys: vec![flow::PERIOD.to_string()],
            values: vec![(value.to_string(), reduction)],
            sort_by: vec![flow::PERIOD.to_string()],
        };
        let out = spec.apply(daily.lazy()).collect()?;
        debug!(code, column = value, rows = out.height(), "weather loaded");
        Ok(Some(out))
    }
}
