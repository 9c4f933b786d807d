use polars::prelude::*;

use crate::error::FlowError;
use crate::fetch::{is_no_data, volumes_of};
use crate::schema::flow;

/// Reduction applied to a value column inside each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Mean,
    Min,
    Max,
}

impl Reduction {
    fn expr(self, column: &str) -> Expr {
        match self {
            Reduction::Sum => col(column).sum(),
            Reduction::Mean => col(column).mean(),
            Reduction::Min => col(column).min(),
            Reduction::Max => col(column).max(),
        }
    }
}

/// Declarative group-by specification.
///
/// Built by the views; executed by [`GroupSpec::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub keys: Vec<String>,
    pub values: Vec<(String, Reduction)>,
    pub sort_by: Vec<String>,
}

impl GroupSpec {
    pub fn apply(&self, frame: LazyFrame) -> LazyFrame {
        let keys: Vec<Expr> = self.keys.iter().map(|k| col(k.as_str())).collect();
        let values: Vec<Expr> = self
            .values
            .iter()
            .map(|(c, r)| r.expr(c))
            .collect();

        let mut output = keys.clone();
        output.extend(self.values.iter().map(|(c, _)| col(c.as_str())));

        frame
            .group_by(keys)
            .agg(values)
            .sort(self.sort_by.clone(), SortMultipleOptions::default())
            .select(output)
    }
}

/// Dimension the series is split by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    /// One line per flow point; keeps both countries and the point type.
    Point,
    CountryFrom,
    CountryTo,
    Category,
    /// Everything summed into a single line.
    Total,
}

impl GroupKey {
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            GroupKey::Point => &[
                flow::COUNTRY_FROM,
                flow::COUNTRY_TO,
                flow::POINT,
                flow::POINT_TYPE,
            ],
            GroupKey::CountryFrom => &[flow::COUNTRY_FROM],
            GroupKey::CountryTo => &[flow::COUNTRY_TO],
            GroupKey::Category => &[flow::CATEGORY],
            GroupKey::Total => &[],
        }
    }

    /// Tie-breakers after `period_from`. Point names are not unique across
    /// country pairs.
    fn sort_columns(self) -> &'static [&'static str] {
        match self {
            GroupKey::Point => &[flow::POINT, flow::COUNTRY_FROM, flow::COUNTRY_TO],
            GroupKey::CountryFrom => &[flow::COUNTRY_FROM],
            GroupKey::CountryTo => &[flow::COUNTRY_TO],
            GroupKey::Category => &[flow::CATEGORY],
            GroupKey::Total => &[],
        }
    }

    pub fn spec(self) -> GroupSpec {
        let mut keys: Vec<String> = self.columns().iter().map(|c| c.to_string()).collect();
        keys.push(flow::PERIOD_FROM.to_string());
        keys.push(flow::PERIOD.to_string());

        let mut sort_by = vec![flow::PERIOD_FROM.to_string()];
        sort_by.extend(self.sort_columns().iter().map(|c| c.to_string()));

        GroupSpec {
            keys,
            values: vec![
                (flow::VOLUME.to_string(), Reduction::Sum),
                (flow::GAS_ENERGY.to_string(), Reduction::Sum),
            ],
            sort_by,
        }
    }
}

/// Concatenate per-table row-sets and regroup them by `key`.
///
/// Empty row-sets are skipped; no input (or an all-zero result) yields the
/// empty frame.
pub fn aggregate(frames: Vec<DataFrame>, key: GroupKey) -> Result<DataFrame, FlowError> {
    let parts: Vec<LazyFrame> = frames
        .into_iter()
        .filter(|f| f.height() > 0)
        .map(|f| f.lazy())
        .collect();
    if parts.is_empty() {
        return Ok(DataFrame::empty());
    }

    let combined = concat(parts, UnionArgs::default())?;
    let out = key.spec().apply(combined).collect()?;

    if is_no_data(volumes_of(&out)?) {
        return Ok(DataFrame::empty());
    }
    Ok(out)
}

// ── Label rewrites ──────────────────────────────────────────────────────────

/// `point` becomes `"<exporter> ➜ <importer> (<point>)"`.
pub fn decorate_point_labels(mut frame: DataFrame) -> Result<DataFrame, FlowError> {
    if frame.height() == 0 {
        return Ok(frame);
    }

    let labels: Vec<String> = {
        let from = frame.column(flow::COUNTRY_FROM)?.str()?;
        let to = frame.column(flow::COUNTRY_TO)?.str()?;
        let point = frame.column(flow::POINT)?.str()?;
        (0..frame.height())
            .map(|i| {
                format!(
                    "{} \u{279C} {} ({})",
                    from.get(i).unwrap_or_default(),
                    to.get(i).unwrap_or_default(),
                    point.get(i).unwrap_or_default()
                )
            })
            .collect()
    };

    frame.with_column(Column::new(flow::POINT.into(), labels))?;
    Ok(frame)
}

/// Week labels gain the `(dd/mm)` of the week's first day.
pub fn decorate_week_labels(mut frame: DataFrame) -> Result<DataFrame, FlowError> {
    if frame.height() == 0 {
        return Ok(frame);
    }

    let labels: Vec<String> = {
        let period = frame.column(flow::PERIOD)?.str()?;
        let from = frame.column(flow::PERIOD_FROM)?.str()?;
        (0..frame.height())
            .map(|i| {
                let label = period.get(i).unwrap_or_default();
                let date = from.get(i).unwrap_or_default();
                match (date.get(8..10), date.get(5..7)) {
                    (Some(day), Some(month)) => format!("{label} ({day}/{month})"),
                    _ => label.to_string(),
                }
            })
            .collect()
    };

    frame.with_column(Column::new(flow::PERIOD.into(), labels))?;
    Ok(frame)
}
