//! Query filter and the top-level engine every dashboard view goes through.
//!
//! One generic pipeline serves all views: select tables, fetch each one,
//! aggregate by the requested key, optionally combine, then publish.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Local, Months, NaiveDate};
use polars::prelude::*;
use tracing::{info, warn};

use crate::aggregate::{aggregate, decorate_point_labels, decorate_week_labels, GroupKey};
use crate::combine::{compare, comparison_series, net_flow, ComparisonBundle};
use crate::config::EngineConfig;
use crate::error::FlowError;
use crate::fetch::{parse_period, FetchWindow, RowFetcher};
use crate::granularity::Granularity;
use crate::lookup::Lookup;
use crate::publish::{ResultCache, ResultView, Snapshot};
use crate::schema::flow;
use crate::selector::{self, FlowKind};
use crate::store::FlowStore;
use crate::table_id::TableId;
use crate::weather::{WeatherSource, WeatherWindow};

// ── Filter parameters ───────────────────────────────────────────────────────

/// Volume unit of the output series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    /// Millions of m³.
    #[default]
    Millions,
    /// Billions of m³.
    Billions,
}

impl Unit {
    pub fn divisor(self) -> f64 {
        match self {
            Unit::Millions => 1.0,
            Unit::Billions => 1000.0,
        }
    }
}

impl FromStr for Unit {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "millions" | "mcm" | "млн" => Ok(Unit::Millions),
            "1000" | "billions" | "bcm" | "млрд" => Ok(Unit::Billions),
            _ => Err(FlowError::InvalidArgument(format!("unit '{s}'"))),
        }
    }
}

/// Dimension a time-series view splits its lines by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupBy {
    #[default]
    Point,
    Country,
    Category,
    Sum,
}

impl FromStr for GroupBy {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" | "point" | "points" => Ok(GroupBy::Point),
            "country" | "countries" => Ok(GroupBy::Country),
            "category" | "group" => Ok(GroupBy::Category),
            "sum" | "total" => Ok(GroupBy::Sum),
            _ => Err(FlowError::InvalidArgument(format!("group_by '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowType {
    #[default]
    Gross,
    Net,
}

impl FromStr for FlowType {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gross" | "gross_flow" => Ok(FlowType::Gross),
            "net" | "net_flow" => Ok(FlowType::Net),
            _ => Err(FlowError::InvalidArgument(format!("flow_type '{s}'"))),
        }
    }
}

/// Immutable parameters of one query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryFilter {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub unit: Unit,
    pub granularity: Granularity,
    pub group_by: GroupBy,
    pub flow_type: FlowType,
}

impl QueryFilter {
    pub fn builder(config: &EngineConfig) -> QueryFilterBuilder {
        QueryFilterBuilder {
            lookback_months: config.lookback_months,
            ..QueryFilterBuilder::default()
        }
    }

    fn window(&self) -> FetchWindow {
        FetchWindow {
            start: self.start,
            end: self.end,
            divisor: self.unit.divisor(),
            granularity: self.granularity,
        }
    }
}

/// Builds a [`QueryFilter`] from the raw strings a dashboard callback hands
/// over. Dates are parsed on `build`; a malformed date is an error.
#[derive(Debug, Clone, Default)]
pub struct QueryFilterBuilder {
    start: Option<String>,
    end: Option<String>,
    unit: Unit,
    granularity: Option<Granularity>,
    group_by: GroupBy,
    flow_type: FlowType,
    lookback_months: u32,
}

impl QueryFilterBuilder {
    pub fn start(mut self, date: impl Into<String>) -> Self {
        self.start = Some(date.into());
        self
    }

    pub fn end(mut self, date: impl Into<String>) -> Self {
        self.end = Some(date.into());
        self
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = Some(granularity);
        self
    }

    pub fn group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn flow_type(mut self, flow_type: FlowType) -> Self {
        self.flow_type = flow_type;
        self
    }

    pub fn build(self) -> Result<QueryFilter, FlowError> {
        let today = Local::now().date_naive();
        self.build_on(today)
    }

    /// Build with an explicit "today" for the defaults.
    pub fn build_on(self, today: NaiveDate) -> Result<QueryFilter, FlowError> {
        let end = match self.end.as_deref() {
            Some(raw) => parse_period(raw.trim())?,
            None => today,
        };
        let start = match self.start.as_deref() {
            Some(raw) => parse_period(raw.trim())?,
            None => today
                .checked_sub_months(Months::new(self.lookback_months))
                .unwrap_or(today),
        };

        Ok(QueryFilter {
            start,
            end,
            unit: self.unit,
            granularity: self.granularity.unwrap_or(Granularity::Day),
            group_by: self.group_by,
            flow_type: self.flow_type,
        })
    }
}

/// How a supply view picks its cross-border tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupplySelection {
    /// One exporter (or `GROUP_EXPORT` aggregate) into any EU member.
    ExporterToEu(String),
    /// Explicit point names.
    Points(Vec<String>),
    /// Exporter/importer pair; either side may be absent or the EU alias.
    Countries {
        exporter: Option<String>,
        importer: Option<String>,
    },
}

impl SupplySelection {
    pub fn countries(exporter: Option<&str>, importer: Option<&str>) -> Self {
        SupplySelection::Countries {
            exporter: exporter.map(str::to_string),
            importer: importer.map(str::to_string),
        }
    }

    /// Direction field "by country" groups on.
    fn country_key(&self) -> GroupKey {
        match self {
            SupplySelection::ExporterToEu(_) => GroupKey::CountryTo,
            SupplySelection::Points(_) => GroupKey::CountryFrom,
            SupplySelection::Countries { exporter, importer } => match (exporter, importer) {
                (Some(_), Some(_)) | (None, Some(_)) => GroupKey::CountryFrom,
                _ => GroupKey::CountryTo,
            },
        }
    }

    /// Flow type actually served. Exporter→EU is always the gross series.
    fn flow_type(&self, requested: FlowType) -> FlowType {
        match self {
            SupplySelection::ExporterToEu(_) => FlowType::Gross,
            _ => requested,
        }
    }

    /// The country whose balance a net-flow view reports.
    fn net_country(&self) -> Option<&str> {
        match self {
            SupplySelection::Countries { exporter, .. } => exporter.as_deref(),
            SupplySelection::ExporterToEu(_) | SupplySelection::Points(_) => None,
        }
    }
}

impl fmt::Display for SupplySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupplySelection::ExporterToEu(e) => write!(f, "{e} -> EU"),
            SupplySelection::Points(points) => write!(f, "points {points:?}"),
            SupplySelection::Countries { exporter, importer } => write!(
                f,
                "{} -> {}",
                exporter.as_deref().unwrap_or("*"),
                importer.as_deref().unwrap_or("*")
            ),
        }
    }
}

// ── Engine ──────────────────────────────────────────────────────────────────

/// Entry point of every dashboard view.
///
/// Each view runs synchronously to completion and, on success, overwrites
/// the shared [`ResultCache`] with its result (an empty frame included).
/// A failing view publishes nothing.
#[derive(Clone)]
pub struct FlowEngine {
    store: Arc<dyn FlowStore>,
    lookup: Arc<Lookup>,
    config: EngineConfig,
    results: ResultCache,
    weather: Option<WeatherSource>,
}

impl FlowEngine {
    pub fn new(
        store: Arc<dyn FlowStore>,
        lookup: Arc<Lookup>,
        config: EngineConfig,
        results: ResultCache,
    ) -> Self {
        Self {
            store,
            lookup,
            config,
            results,
            weather: None,
        }
    }

    pub fn with_weather(mut self, weather: WeatherSource) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lookup(&self) -> &Lookup {
        &self.lookup
    }

    pub fn results(&self) -> &ResultCache {
        &self.results
    }

    pub fn last_result(&self) -> Option<Snapshot> {
        self.results.latest()
    }

    /// Filter builder carrying this engine's default lookback.
    pub fn filter(&self) -> QueryFilterBuilder {
        QueryFilter::builder(&self.config)
    }

    // ── Supply ──────────────────────────────────────────────────────────────

    /// Cross-border flow over time, gross or net.
    pub fn supply_time(
        &self,
        filter: &QueryFilter,
        selection: &SupplySelection,
    ) -> Result<DataFrame, FlowError> {
        let window = filter.window();
        let (frame, tables) = match selection.flow_type(filter.flow_type) {
            FlowType::Gross => {
                let tables = self.supply_tables(selection)?;
                let key = match filter.group_by {
                    GroupBy::Point => GroupKey::Point,
                    GroupBy::Country => selection.country_key(),
                    GroupBy::Sum => GroupKey::Total,
                    GroupBy::Category => {
                        return Err(FlowError::Unsupported(
                            "supply views have no consumer categories".into(),
                        ))
                    }
                };
                let mut frame = self.gross(&tables, &window, key)?;
                if key == GroupKey::Point && matches!(selection, SupplySelection::Points(_)) {
                    frame = decorate_point_labels(frame)?;
                }
                (frame, tables.len())
            }
            FlowType::Net => self.net(selection, &window)?,
        };

        let frame = self.time_labels(frame, filter)?;
        info!(
            view = "supply_time",
            selection = %selection,
            tables,
            rows = frame.height(),
            "query complete"
        );
        Ok(self.publish_series("supply_time", frame))
    }

    /// Supply compared year over year against the pre-cutoff envelope.
    pub fn supply_compare(
        &self,
        filter: &QueryFilter,
        selection: &SupplySelection,
        years: &[i32],
    ) -> Result<ComparisonBundle, FlowError> {
        let window = self.history_window(filter)?;
        let (daily, tables) = match selection.flow_type(filter.flow_type) {
            FlowType::Gross => {
                let tables = self.supply_tables(selection)?;
                (self.gross(&tables, &window, GroupKey::Total)?, tables.len())
            }
            FlowType::Net => {
                let (net, tables) = self.net(selection, &window)?;
                (self.period_columns(net)?, tables)
            }
        };

        let bundle = self.comparison(&daily, filter, years)?;
        info!(
            view = "supply_compare",
            selection = %selection,
            tables,
            partitions = bundle.len(),
            "query complete"
        );
        Ok(self.publish_bundle("supply_compare", bundle))
    }

    // ── Demand ──────────────────────────────────────────────────────────────

    /// Domestic consumption over time, optionally with temperature and
    /// forecast columns when exactly one country is selected.
    pub fn demand_time(
        &self,
        filter: &QueryFilter,
        countries: &[String],
        with_weather: bool,
    ) -> Result<DataFrame, FlowError> {
        let mut frame = self.domestic_series(FlowKind::Demand, filter, countries)?;

        if with_weather {
            frame = self.merge_weather(frame, filter, countries)?;
        }

        let frame = self.time_labels(frame, filter)?;
        info!(
            view = "demand_time",
            countries = ?countries,
            rows = frame.height(),
            "query complete"
        );
        Ok(self.publish_series("demand_time", frame))
    }

    pub fn demand_compare(
        &self,
        filter: &QueryFilter,
        countries: &[String],
        years: &[i32],
    ) -> Result<ComparisonBundle, FlowError> {
        let bundle = self.domestic_compare(FlowKind::Demand, filter, countries, years)?;
        info!(
            view = "demand_compare",
            countries = ?countries,
            partitions = bundle.len(),
            "query complete"
        );
        Ok(self.publish_bundle("demand_compare", bundle))
    }

    /// Consumption per consumer category.
    pub fn demand_category_time(
        &self,
        filter: &QueryFilter,
        countries: &[String],
        categories: &[String],
    ) -> Result<DataFrame, FlowError> {
        let tagged = selector::by_category(&self.lookup, countries, categories)?;
        let key = match filter.group_by {
            GroupBy::Sum => GroupKey::Total,
            _ => GroupKey::Category,
        };
        let frame = self.gross_tagged(&tagged, &filter.window(), key)?;

        let frame = self.time_labels(frame, filter)?;
        info!(
            view = "demand_category_time",
            countries = ?countries,
            tables = tagged.len(),
            rows = frame.height(),
            "query complete"
        );
        Ok(self.publish_series("demand_category_time", frame))
    }

    pub fn demand_category_compare(
        &self,
        filter: &QueryFilter,
        countries: &[String],
        categories: &[String],
        years: &[i32],
    ) -> Result<ComparisonBundle, FlowError> {
        let window = self.history_window(filter)?;
        let tagged = selector::by_category(&self.lookup, countries, categories)?;
        let daily = self.gross_tagged(&tagged, &window, GroupKey::Total)?;

        let bundle = self.comparison(&daily, filter, years)?;
        info!(
            view = "demand_category_compare",
            countries = ?countries,
            tables = tagged.len(),
            partitions = bundle.len(),
            "query complete"
        );
        Ok(self.publish_bundle("demand_category_compare", bundle))
    }

    // ── LNG ─────────────────────────────────────────────────────────────────

    pub fn lng_time(
        &self,
        filter: &QueryFilter,
        countries: &[String],
    ) -> Result<DataFrame, FlowError> {
        let frame = self.domestic_series(FlowKind::Lng, filter, countries)?;
        let frame = self.time_labels(frame, filter)?;
        info!(
            view = "lng_time",
            countries = ?countries,
            rows = frame.height(),
            "query complete"
        );
        Ok(self.publish_series("lng_time", frame))
    }

    pub fn lng_compare(
        &self,
        filter: &QueryFilter,
        countries: &[String],
        years: &[i32],
    ) -> Result<ComparisonBundle, FlowError> {
        let bundle = self.domestic_compare(FlowKind::Lng, filter, countries, years)?;
        info!(
            view = "lng_compare",
            countries = ?countries,
            partitions = bundle.len(),
            "query complete"
        );
        Ok(self.publish_bundle("lng_compare", bundle))
    }

    // ── Pipeline ────────────────────────────────────────────────────────────

    fn fetcher(&self) -> RowFetcher<'_> {
        RowFetcher::new(self.store.as_ref(), &self.lookup, &self.config)
    }

    fn supply_tables(&self, selection: &SupplySelection) -> Result<Vec<TableId>, FlowError> {
        match selection {
            SupplySelection::ExporterToEu(exporter) => {
                selector::exporter_to_eu(&self.lookup, exporter)
            }
            SupplySelection::Points(points) => selector::by_points(&self.lookup, points),
            SupplySelection::Countries { exporter, importer } => {
                selector::by_country(&self.lookup, exporter.as_deref(), importer.as_deref())
            }
        }
    }

    /// Fetch every table and aggregate by `key`.
    fn gross(
        &self,
        tables: &[TableId],
        window: &FetchWindow,
        key: GroupKey,
    ) -> Result<DataFrame, FlowError> {
        let fetcher = self.fetcher();
        let frames = tables
            .iter()
            .map(|t| fetcher.fetch(t, window))
            .collect::<Result<Vec<_>, _>>()?;
        aggregate(frames, key)
    }

    fn gross_tagged(
        &self,
        tagged: &[(String, TableId)],
        window: &FetchWindow,
        key: GroupKey,
    ) -> Result<DataFrame, FlowError> {
        let fetcher = self.fetcher();
        let frames = tagged
            .iter()
            .map(|(category, t)| fetcher.fetch_tagged(t, Some(category), window))
            .collect::<Result<Vec<_>, _>>()?;
        aggregate(frames, key)
    }

    /// Imports into the selected country minus its exports, with a leading
    /// `country` column. Returns the frame and the number of tables read.
    fn net(
        &self,
        selection: &SupplySelection,
        window: &FetchWindow,
    ) -> Result<(DataFrame, usize), FlowError> {
        let Some(country) = selection.net_country() else {
            return Ok((DataFrame::empty(), 0));
        };

        let into = selector::by_country(&self.lookup, None, Some(country))?;
        let out_of = selector::by_country(&self.lookup, Some(country), None)?;
        let imports = self.gross(&into, window, GroupKey::Total)?;
        let exports = self.gross(&out_of, window, GroupKey::Total)?;

        let net = net_flow(&imports, &exports)?;
        let tables = into.len() + out_of.len();
        if net.height() == 0 {
            return Ok((net, tables));
        }

        let labelled = net
            .lazy()
            .select([
                lit(country.to_string()).alias(flow::COUNTRY),
                col(flow::PERIOD_FROM),
                col(flow::PERIOD),
                col(flow::VOLUME),
                col(flow::GAS_ENERGY),
            ])
            .collect()?;
        Ok((labelled, tables))
    }

    fn domestic_series(
        &self,
        kind: FlowKind,
        filter: &QueryFilter,
        countries: &[String],
    ) -> Result<DataFrame, FlowError> {
        let tables = selector::domestic(&self.lookup, kind, countries)?;
        let key = match filter.group_by {
            GroupBy::Point => GroupKey::Point,
            GroupBy::Country => GroupKey::CountryTo,
            GroupBy::Sum => GroupKey::Total,
            GroupBy::Category => {
                return Err(FlowError::Unsupported(
                    "category grouping goes through the category views".into(),
                ))
            }
        };
        self.gross(&tables, &filter.window(), key)
    }

    fn domestic_compare(
        &self,
        kind: FlowKind,
        filter: &QueryFilter,
        countries: &[String],
        years: &[i32],
    ) -> Result<ComparisonBundle, FlowError> {
        let window = self.history_window(filter)?;
        let tables = selector::domestic(&self.lookup, kind, countries)?;
        let daily = self.gross(&tables, &window, GroupKey::Total)?;
        self.comparison(&daily, filter, years)
    }

    /// Daily window from the history start, rejecting granularities that
    /// have no period-of-year key before any table is read.
    fn history_window(&self, filter: &QueryFilter) -> Result<FetchWindow, FlowError> {
        if filter.granularity == Granularity::Year {
            return Err(FlowError::Unsupported(
                "year granularity has no period-of-year comparison".into(),
            ));
        }
        Ok(FetchWindow {
            start: self.config.history_start,
            end: filter.end,
            divisor: filter.unit.divisor(),
            granularity: Granularity::Day,
        })
    }

    fn comparison(
        &self,
        daily: &DataFrame,
        filter: &QueryFilter,
        years: &[i32],
    ) -> Result<ComparisonBundle, FlowError> {
        let years = if years.is_empty() {
            self.config.compare_years.as_slice()
        } else {
            years
        };
        let series = comparison_series(daily, filter.granularity, self.config.locale)?;
        compare(&series, years, self.config.baseline_cutoff_year)
    }

    /// Drop the leading `country` column of a net frame.
    fn period_columns(&self, frame: DataFrame) -> Result<DataFrame, FlowError> {
        if frame.height() == 0 {
            return Ok(frame);
        }
        Ok(frame.select([flow::PERIOD_FROM, flow::PERIOD, flow::VOLUME, flow::GAS_ENERGY])?)
    }

    fn merge_weather(
        &self,
        frame: DataFrame,
        filter: &QueryFilter,
        countries: &[String],
    ) -> Result<DataFrame, FlowError> {
        let Some(weather) = &self.weather else {
            warn!("weather requested but no weather source is configured");
            return Ok(frame);
        };
        let [country] = countries else {
            warn!(countries = countries.len(), "weather merge needs exactly one country");
            return Ok(frame);
        };
        if self.lookup.is_eu_alias(country) {
            return Ok(frame);
        }

        let code = self.lookup.country_code(country)?;
        let window = WeatherWindow {
            start: filter.start,
            end: filter.end,
            granularity: filter.granularity,
            locale: self.config.locale,
        };
        weather.merge(frame, code, &window)
    }

    fn time_labels(&self, frame: DataFrame, filter: &QueryFilter) -> Result<DataFrame, FlowError> {
        if filter.granularity == Granularity::Week {
            decorate_week_labels(frame)
        } else {
            Ok(frame)
        }
    }

    fn publish_series(&self, view: &str, frame: DataFrame) -> DataFrame {
        self.results.publish(view, ResultView::Series(frame.clone()));
        frame
    }

    fn publish_bundle(&self, view: &str, bundle: ComparisonBundle) -> ComparisonBundle {
        self.results.publish(view, ResultView::Comparison(bundle.clone()));
        bundle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn default_window_looks_back_in_calendar_months() {
        let config = EngineConfig::default();
        let filter = QueryFilter::builder(&config).build_on(d(2022, 5, 31)).unwrap();
        assert_eq!(filter.start, d(2022, 2, 28));
        assert_eq!(filter.end, d(2022, 5, 31));
        assert_eq!(filter.granularity, Granularity::Day);
        assert_eq!(filter.unit.divisor(), 1.0);
    }

    #[test]
    fn explicit_dates_are_parsed() {
        let config = EngineConfig::default();
        let filter = QueryFilter::builder(&config)
            .start("2022-01-01")
            .end("2022-01-07T00:00:00")
            .unit(Unit::Billions)
            .build_on(d(2023, 1, 1))
            .unwrap();
        assert_eq!(filter.start, d(2022, 1, 1));
        assert_eq!(filter.end, d(2022, 1, 7));
        assert_eq!(filter.unit.divisor(), 1000.0);
    }

    #[test]
    fn malformed_date_fails() {
        let config = EngineConfig::default();
        let err = QueryFilter::builder(&config).start("01/02/2022").build_on(d(2023, 1, 1));
        assert!(matches!(err, Err(FlowError::InvalidDate(_))));
    }

    #[test]
    fn option_labels_parse() {
        assert_eq!("net_flow".parse::<FlowType>().unwrap(), FlowType::Net);
        assert_eq!("default".parse::<GroupBy>().unwrap(), GroupBy::Point);
        assert_eq!("1000".parse::<Unit>().unwrap(), Unit::Billions);
        assert!("weekly".parse::<GroupBy>().is_err());
    }

    #[test]
    fn supply_country_key_direction() {
        let both = SupplySelection::countries(Some("Russia"), Some("Germany"));
        let importer = SupplySelection::countries(None, Some("Germany"));
        let exporter = SupplySelection::countries(Some("Russia"), None);
        assert_eq!(both.country_key(), GroupKey::CountryFrom);
        assert_eq!(importer.country_key(), GroupKey::CountryFrom);
        assert_eq!(exporter.country_key(), GroupKey::CountryTo);
        assert_eq!(
            SupplySelection::ExporterToEu("Russia".into()).country_key(),
            GroupKey::CountryTo
        );
        assert_eq!(SupplySelection::Points(vec![]).country_key(), GroupKey::CountryFrom);
    }
}
