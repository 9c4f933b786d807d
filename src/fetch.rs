//! Row fetcher: one flow-point table in, one normalized, period-labeled
//! row-set out.

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::FlowError;
use crate::granularity::Granularity;
use crate::lookup::Lookup;
use crate::schema::{bucket, flow, store as raw};
use crate::store::FlowStore;
use crate::table_id::TableId;

/// Date range, unit divisor and granularity shared by every table of a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// 1 for millions of m³, 1000 for billions.
    pub divisor: f64,
    pub granularity: Granularity,
}

/// Display labels resolved from a table identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointLabels {
    pub country_from: String,
    pub country_to: String,
    pub point: String,
    pub point_type: String,
}

impl PointLabels {
    pub fn resolve(lookup: &Lookup, table: &TableId) -> Result<Self, FlowError> {
        let point = lookup
            .point_name(table.point_id())?
            .replace('/', " ")
            .replace('\'', "");
        let point_type = lookup
            .point_type_name(table.point_type())?
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();

        Ok(PointLabels {
            country_from: lookup.country_name(table.exporter())?.to_string(),
            country_to: lookup.country_name(table.importer())?.to_string(),
            point,
            point_type,
        })
    }
}

/// m³-equivalent volume of one daily row, rounded to `decimals`.
pub fn volume(
    energy: f64,
    gcv: Option<f64>,
    divisor: f64,
    fallback_gcv: f64,
    decimals: u32,
) -> f64 {
    let gcv = gcv.filter(|g| *g > 0.0).unwrap_or(fallback_gcv);
    let scale = 10f64.powi(decimals as i32);
    (energy / divisor / gcv / 1_000_000.0 * scale).round() / scale
}

/// Canonical "no data" rule: fewer than three distinct volumes, all of them
/// zero (or none at all).
pub fn is_no_data<I>(volumes: I) -> bool
where
    I: IntoIterator<Item = f64>,
{
    let mut distinct: Vec<f64> = Vec::with_capacity(3);
    for v in volumes {
        if !distinct.contains(&v) {
            distinct.push(v);
            if distinct.len() >= 3 {
                return false;
            }
        }
    }
    distinct.iter().all(|v| *v == 0.0)
}

pub(crate) fn volumes_of(frame: &DataFrame) -> Result<Vec<f64>, FlowError> {
    let volumes = frame
        .column(flow::VOLUME)?
        .as_materialized_series()
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect();
    Ok(volumes)
}

pub(crate) fn parse_period(value: &str) -> Result<NaiveDate, FlowError> {
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| FlowError::InvalidDate(value.to_string()))
}

pub struct RowFetcher<'a> {
    store: &'a dyn FlowStore,
    lookup: &'a Lookup,
    config: &'a EngineConfig,
}

impl<'a> RowFetcher<'a> {
    pub fn new(store: &'a dyn FlowStore, lookup: &'a Lookup, config: &'a EngineConfig) -> Self {
        Self {
            store,
            lookup,
            config,
        }
    }

    pub fn fetch(&self, table: &TableId, window: &FetchWindow) -> Result<DataFrame, FlowError> {
        self.fetch_tagged(table, None, window)
    }

    /// Fetch a table and tag every row with a consumer category.
    ///
    /// Returns an empty frame when the table holds no data in the window.
    pub fn fetch_tagged(
        &self,
        table: &TableId,
        category: Option<&str>,
        window: &FetchWindow,
    ) -> Result<DataFrame, FlowError> {
        let labels = PointLabels::resolve(self.lookup, table)?;
        let raw_rows = self.store.load(table, window.start, window.end)?;

        let daily = self.daily_frame(&raw_rows, window)?;
        let reduced = if window.granularity.reduces() {
            reduce_buckets(daily, &[])?
        } else {
            daily
        };

        if is_no_data(volumes_of(&reduced)?) {
            debug!(table = %table, granularity = %window.granularity, "no data");
            return Ok(DataFrame::empty());
        }

        let mut tags = vec![
            lit(labels.country_from).alias(flow::COUNTRY_FROM),
            lit(labels.country_to).alias(flow::COUNTRY_TO),
            lit(labels.point).alias(flow::POINT),
            lit(labels.point_type).alias(flow::POINT_TYPE),
        ];
        let mut order = vec![
            col(flow::COUNTRY_FROM),
            col(flow::COUNTRY_TO),
            col(flow::POINT),
            col(flow::POINT_TYPE),
        ];
        if let Some(category) = category {
            tags.push(lit(category.to_string()).alias(flow::CATEGORY));
            order.push(col(flow::CATEGORY));
        }
        order.extend([
            col(flow::PERIOD_FROM),
            col(flow::PERIOD),
            col(flow::VOLUME),
            col(flow::GAS_ENERGY),
        ]);

        let rows = reduced.lazy().with_columns(tags).select(order).collect()?;
        debug!(
            table = %table,
            granularity = %window.granularity,
            rows = rows.height(),
            "fetched table"
        );
        Ok(rows)
    }

    /// Per-day volume, bucket key and period label.
    fn daily_frame(
        &self,
        raw_rows: &DataFrame,
        window: &FetchWindow,
    ) -> Result<DataFrame, FlowError> {
        let dates = raw_rows.column(raw::PERIOD_FROM)?.str()?;
        let energy = raw_rows.column(raw::GAS_ENERGY)?.f64()?;
        let gcv = raw_rows.column(raw::GCV_VALUE)?.f64()?;

        let n = raw_rows.height();
        let mut period_from = Vec::with_capacity(n);
        let mut keys = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        let mut expected = Vec::with_capacity(n);
        let mut volumes = Vec::with_capacity(n);
        let mut energies = Vec::with_capacity(n);

        for i in 0..n {
            let Some(raw_date) = dates.get(i) else {
                continue;
            };
            let date = parse_period(raw_date)?;
            let kwh = energy.get(i).unwrap_or(0.0);
            let bucket = window.granularity.bucket(date, self.config.locale);

            period_from.push(date.format("%Y-%m-%d").to_string());
            keys.push(bucket.key);
            labels.push(bucket.label);
            expected.push(i64::from(bucket.expected_days));
            volumes.push(volume(
                kwh,
                gcv.get(i),
                window.divisor,
                self.config.fallback_gcv,
                self.config.volume_decimals,
            ));
            energies.push(kwh);
        }

        Ok(df!(
            flow::PERIOD_FROM => period_from,
            bucket::KEY => keys,
            flow::PERIOD => labels,
            bucket::EXPECTED_DAYS => expected,
            flow::VOLUME => volumes,
            flow::GAS_ENERGY => energies,
        )?)
    }
}

/// Sum daily rows into their buckets, dropping incomplete buckets.
///
/// `period_from` of a bucket is its earliest day. Columns in `carry` are
/// constant within a bucket and are kept (first value) ahead of the period.
pub(crate) fn reduce_buckets(daily: DataFrame, carry: &[&str]) -> Result<DataFrame, FlowError> {
    let mut aggs: Vec<Expr> = carry.iter().map(|c| col(*c).first()).collect();
    aggs.extend([
        col(flow::PERIOD_FROM).first(),
        col(flow::VOLUME).sum(),
        col(flow::GAS_ENERGY).sum(),
        col(flow::GAS_ENERGY).count().alias(bucket::DAYS),
        col(bucket::EXPECTED_DAYS).first(),
    ]);

    let mut output: Vec<Expr> = carry.iter().map(|c| col(*c)).collect();
    output.extend([
        col(flow::PERIOD_FROM),
        col(flow::PERIOD),
        col(flow::VOLUME),
        col(flow::GAS_ENERGY),
    ]);

    let reduced = daily
        .lazy()
        .sort([flow::PERIOD_FROM], SortMultipleOptions::default())
        .group_by([col(bucket::KEY), col(flow::PERIOD)])
        .agg(aggs)
        .filter(
            col(bucket::EXPECTED_DAYS).eq(lit(0i64)).or(col(bucket::DAYS)
                .cast(DataType::Int64)
                .eq(col(bucket::EXPECTED_DAYS))),
        )
        .sort([flow::PERIOD_FROM], SortMultipleOptions::default())
        .select(output)
        .collect()?;
    Ok(reduced)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_uses_gcv_or_fallback() {
        assert_eq!(volume(114_000_000.0, None, 1.0, 11.4, 2), 10.0);
        assert_eq!(volume(114_000_000.0, Some(0.0), 1.0, 11.4, 2), 10.0);
        assert_eq!(volume(105_000_000.0, Some(10.5), 1.0, 11.4, 2), 10.0);
        assert_eq!(volume(105_000_000.0, Some(10.5), 1000.0, 11.4, 2), 0.01);
    }

    #[test]
    fn no_data_rule() {
        assert!(is_no_data(Vec::<f64>::new()));
        assert!(is_no_data(vec![0.0, 0.0, 0.0]));
        assert!(!is_no_data(vec![0.0, 0.0, 7.0]));
        assert!(!is_no_data(vec![5.0]));
        assert!(!is_no_data(vec![0.0, 1.0, 2.0]));
    }

    #[test]
    fn reduce_drops_incomplete_buckets() {
        let daily = df!(
            flow::PERIOD_FROM => ["2022-01-01", "2022-01-02", "2022-01-03", "2022-01-04"],
            bucket::KEY => ["a", "a", "b", "b"],
            flow::PERIOD => ["A", "A", "B", "B"],
            bucket::EXPECTED_DAYS => [3i64, 3, 2, 2],
            flow::VOLUME => [1.0, 1.0, 2.0, 3.0],
            flow::GAS_ENERGY => [10.0, 10.0, 20.0, 30.0],
        )
        .unwrap();

        let out = reduce_buckets(daily, &[]).unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(volumes_of(&out).unwrap(), vec![5.0]);
        let from = out.column(flow::PERIOD_FROM).unwrap().str().unwrap();
        assert_eq!(from.get(0), Some("2022-01-03"));
    }
}
