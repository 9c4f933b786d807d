//! Flow combinator: net flow and period-of-year comparison bundles.

use std::collections::BTreeMap;

use chrono::Datelike;
use polars::prelude::*;

use crate::aggregate::{GroupKey, GroupSpec, Reduction};
use crate::error::FlowError;
use crate::fetch::{parse_period, reduce_buckets};
use crate::granularity::{CompareKey, Granularity, Locale};
use crate::schema::{bucket, compare, flow};

/// Comparison result: one frame per requested year plus the `min` and
/// `max` envelopes, keyed by flag.
pub type ComparisonBundle = BTreeMap<String, DataFrame>;

fn period_columns(negate: bool) -> [Expr; 4] {
    let sign = if negate { -1.0 } else { 1.0 };
    [
        col(flow::PERIOD_FROM),
        col(flow::PERIOD),
        (col(flow::VOLUME) * lit(sign)).alias(flow::VOLUME),
        (col(flow::GAS_ENERGY) * lit(sign)).alias(flow::GAS_ENERGY),
    ]
}

/// `imports - exports`, matched on period.
///
/// Both inputs are total series (`period_from`, `period`, `volume`,
/// `gas_energy`). A period present on one side only keeps that side's
/// signed value.
pub fn net_flow(imports: &DataFrame, exports: &DataFrame) -> Result<DataFrame, FlowError> {
    let mut parts = Vec::with_capacity(2);
    if imports.height() > 0 {
        parts.push(imports.clone().lazy().select(period_columns(false)));
    }
    if exports.height() > 0 {
        parts.push(exports.clone().lazy().select(period_columns(true)));
    }
    if parts.is_empty() {
        return Ok(DataFrame::empty());
    }

    let combined = concat(parts, UnionArgs::default())?;
    Ok(GroupKey::Total.spec().apply(combined).collect()?)
}

/// Attach `year` and `group_by` to a daily total series, reducing to weeks
/// or months when asked.
///
/// Output columns: `year`, `group_by`, `period_from`, `period`, `volume`,
/// `gas_energy`, sorted by `year` then `group_by`.
pub fn comparison_series(
    daily: &DataFrame,
    granularity: Granularity,
    locale: Locale,
) -> Result<DataFrame, FlowError> {
    if granularity == Granularity::Year {
        return Err(FlowError::Unsupported(
            "year granularity has no period-of-year comparison".into(),
        ));
    }
    if daily.height() == 0 {
        return Ok(DataFrame::empty());
    }

    let n = daily.height();
    let mut years = Vec::with_capacity(n);
    let mut day_keys: Vec<String> = Vec::new();
    let mut num_keys: Vec<i32> = Vec::new();
    let mut bucket_keys = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    let mut expected = Vec::with_capacity(n);
    {
        let from = daily.column(flow::PERIOD_FROM)?.str()?;
        let period = daily.column(flow::PERIOD)?.str()?;
        for i in 0..n {
            let date = parse_period(from.get(i).unwrap_or_default())?;
            years.push(date.year());
            match granularity.compare_key(date)? {
                CompareKey::MonthDay(key) => day_keys.push(key),
                CompareKey::Week(key) | CompareKey::Month(key) => num_keys.push(key),
            }
            if granularity.reduces() {
                let b = granularity.bucket(date, locale);
                bucket_keys.push(b.key);
                labels.push(b.label);
                expected.push(i64::from(b.expected_days));
            } else {
                labels.push(period.get(i).unwrap_or_default().to_string());
            }
        }
    }

    let group_by = if granularity.reduces() {
        Column::new(compare::GROUP_BY.into(), num_keys)
    } else {
        Column::new(compare::GROUP_BY.into(), day_keys)
    };

    let mut frame = daily.select([flow::PERIOD_FROM, flow::VOLUME, flow::GAS_ENERGY])?;
    frame.with_column(Column::new(compare::YEAR.into(), years))?;
    frame.with_column(group_by)?;
    frame.with_column(Column::new(flow::PERIOD.into(), labels))?;

    let frame = if granularity.reduces() {
        frame.with_column(Column::new(bucket::KEY.into(), bucket_keys))?;
        frame.with_column(Column::new(bucket::EXPECTED_DAYS.into(), expected))?;
        reduce_buckets(frame, &[compare::YEAR, compare::GROUP_BY])?
    } else {
        frame.select([
            compare::YEAR,
            compare::GROUP_BY,
            flow::PERIOD_FROM,
            flow::PERIOD,
            flow::VOLUME,
            flow::GAS_ENERGY,
        ])?
    };

    Ok(frame
        .lazy()
        .sort([compare::YEAR, compare::GROUP_BY], SortMultipleOptions::default())
        .collect()?)
}

fn with_flag(mut frame: DataFrame, flag: &str) -> Result<DataFrame, FlowError> {
    let n = frame.height();
    frame.with_column(Column::new(compare::FLAG.into(), vec![flag.to_string(); n]))?;
    Ok(frame)
}

fn envelope(reduction: Reduction) -> GroupSpec {
    GroupSpec {
        keys: vec![compare::GROUP_BY.to_string()],
        values: vec![
            (flow::VOLUME.to_string(), reduction),
            (flow::GAS_ENERGY.to_string(), reduction),
        ],
        sort_by: vec![compare::GROUP_BY.to_string()],
    }
}

/// Split a comparison series into one partition per year in `years` plus
/// the `max`/`min` envelopes over all years strictly before `cutoff`.
///
/// Always holds exactly `len(unique years) + 2` partitions; partitions with
/// no rows are present and empty.
pub fn compare(
    series: &DataFrame,
    years: &[i32],
    cutoff: i32,
) -> Result<ComparisonBundle, FlowError> {
    let mut wanted: Vec<i32> = Vec::with_capacity(years.len());
    for y in years {
        if !wanted.contains(y) {
            wanted.push(*y);
        }
    }

    let mut bundle = ComparisonBundle::new();
    if series.height() == 0 {
        bundle.insert(compare::MAX.to_string(), DataFrame::empty());
        bundle.insert(compare::MIN.to_string(), DataFrame::empty());
        for y in wanted {
            bundle.insert(y.to_string(), DataFrame::empty());
        }
        return Ok(bundle);
    }

    let lf = series.clone().lazy();
    let baseline = lf.clone().filter(col(compare::YEAR).lt(lit(cutoff)));
    for (flag, reduction) in [(compare::MAX, Reduction::Max), (compare::MIN, Reduction::Min)] {
        let frame = envelope(reduction).apply(baseline.clone()).collect()?;
        bundle.insert(flag.to_string(), with_flag(frame, flag)?);
    }

    for y in wanted {
        let frame = lf
            .clone()
            .filter(col(compare::YEAR).eq(lit(y)))
            .sort([compare::YEAR, compare::GROUP_BY], SortMultipleOptions::default())
            .collect()?;
        let flag = y.to_string();
        bundle.insert(flag.clone(), with_flag(frame, &flag)?);
    }
    Ok(bundle)
}
