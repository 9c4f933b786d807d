use std::collections::BTreeMap;
use std::sync::Arc;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3_polars::PyDataFrame;

use crate::combine::ComparisonBundle;
use crate::config::{init_logging, EngineConfig};
use crate::error::FlowError;
use crate::lookup::Lookup;
use crate::publish::ResultCache;
use crate::query::{FlowEngine, QueryFilter, SupplySelection};
use crate::schema;
use crate::store::{CsvStore, FlowStore, SqliteStore};
use crate::weather::WeatherSource;

fn bundle_to_py(bundle: ComparisonBundle) -> BTreeMap<String, PyDataFrame> {
    bundle
        .into_iter()
        .map(|(flag, frame)| (flag, PyDataFrame(frame)))
        .collect()
}

#[pyclass(name = "FlowEngine")]
pub struct PyFlowEngine {
    engine: FlowEngine,
}

impl PyFlowEngine {
    fn filter(
        &self,
        start: Option<String>,
        end: Option<String>,
        unit: &str,
        granularity: &str,
        group_by: &str,
        flow_type: &str,
    ) -> Result<QueryFilter, FlowError> {
        let mut builder = self
            .engine
            .filter()
            .unit(unit.parse()?)
            .granularity(granularity.parse()?)
            .group_by(group_by.parse()?)
            .flow_type(flow_type.parse()?);
        if let Some(start) = start {
            builder = builder.start(start);
        }
        if let Some(end) = end {
            builder = builder.end(end);
        }
        builder.build()
    }
}

fn supply_selection(
    exporter: Option<String>,
    importer: Option<String>,
    points: Option<Vec<String>>,
    exporter_to_eu: Option<String>,
) -> SupplySelection {
    match (points, exporter_to_eu) {
        (Some(points), _) if !points.is_empty() => SupplySelection::Points(points),
        (_, Some(exporter)) => SupplySelection::ExporterToEu(exporter),
        _ => SupplySelection::Countries { exporter, importer },
    }
}

#[pymethods]
impl PyFlowEngine {
    /// Open a store and the lookup document.
    ///
    /// `store_kind` is `"sqlite"` (a database file) or `"csv"` (a directory
    /// of `<table id>.csv` files).
    #[new]
    #[pyo3(signature = (lookup_path, store_path, store_kind = "sqlite", config_path = None, weather_dir = None))]
    fn new(
        lookup_path: &str,
        store_path: &str,
        store_kind: &str,
        config_path: Option<&str>,
        weather_dir: Option<&str>,
    ) -> PyResult<Self> {
        init_logging();

        let store: Arc<dyn FlowStore> = match store_kind {
            "sqlite" => Arc::new(SqliteStore::open(store_path)?),
            "csv" => Arc::new(CsvStore::new(store_path)),
            other => {
                return Err(PyValueError::new_err(format!(
                    "store_kind must be 'sqlite' or 'csv', got '{other}'"
                )))
            }
        };
        let lookup = Arc::new(Lookup::from_json_file(lookup_path)?);
        let config = match config_path {
            Some(path) => EngineConfig::from_json_file(path)?,
            None => EngineConfig::default(),
        };

        let mut engine = FlowEngine::new(store, lookup, config, ResultCache::new());
        if let Some(dir) = weather_dir {
            engine = engine.with_weather(WeatherSource::new(dir));
        }
        Ok(Self { engine })
    }

    // ── Supply ──────────────────────────────────────────────────────────────

    #[pyo3(signature = (
        exporter = None, importer = None, points = None, exporter_to_eu = None,
        start = None, end = None, unit = "millions", granularity = "day",
        group_by = "point", flow_type = "gross",
    ))]
    #[allow(clippy::too_many_arguments)]
    fn supply_time(
        &self,
        exporter: Option<String>,
        importer: Option<String>,
        points: Option<Vec<String>>,
        exporter_to_eu: Option<String>,
        start: Option<String>,
        end: Option<String>,
        unit: &str,
        granularity: &str,
        group_by: &str,
        flow_type: &str,
    ) -> PyResult<PyDataFrame> {
        let filter = self.filter(start, end, unit, granularity, group_by, flow_type)?;
        let selection = supply_selection(exporter, importer, points, exporter_to_eu);
        Ok(PyDataFrame(self.engine.supply_time(&filter, &selection)?))
    }

    #[pyo3(signature = (
        years = Vec::new(), exporter = None, importer = None, points = None,
        exporter_to_eu = None, end = None, unit = "millions", granularity = "day",
        flow_type = "gross",
    ))]
    #[allow(clippy::too_many_arguments)]
    fn supply_compare(
        &self,
        years: Vec<i32>,
        exporter: Option<String>,
        importer: Option<String>,
        points: Option<Vec<String>>,
        exporter_to_eu: Option<String>,
        end: Option<String>,
        unit: &str,
        granularity: &str,
        flow_type: &str,
    ) -> PyResult<BTreeMap<String, PyDataFrame>> {
        let filter = self.filter(None, end, unit, granularity, "sum", flow_type)?;
        let selection = supply_selection(exporter, importer, points, exporter_to_eu);
        Ok(bundle_to_py(self.engine.supply_compare(&filter, &selection, &years)?))
    }

    // ── Demand ──────────────────────────────────────────────────────────────

    #[pyo3(signature = (
        countries, start = None, end = None, unit = "millions", granularity = "day",
        group_by = "point", with_weather = false,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn demand_time(
        &self,
        countries: Vec<String>,
        start: Option<String>,
        end: Option<String>,
        unit: &str,
        granularity: &str,
        group_by: &str,
        with_weather: bool,
    ) -> PyResult<PyDataFrame> {
        let filter = self.filter(start, end, unit, granularity, group_by, "gross")?;
        Ok(PyDataFrame(self.engine.demand_time(&filter, &countries, with_weather)?))
    }

    #[pyo3(signature = (countries, years = Vec::new(), end = None, unit = "millions", granularity = "day"))]
    fn demand_compare(
        &self,
        countries: Vec<String>,
        years: Vec<i32>,
        end: Option<String>,
        unit: &str,
        granularity: &str,
    ) -> PyResult<BTreeMap<String, PyDataFrame>> {
        let filter = self.filter(None, end, unit, granularity, "sum", "gross")?;
        Ok(bundle_to_py(self.engine.demand_compare(&filter, &countries, &years)?))
    }

    #[pyo3(signature = (
        countries, categories, start = None, end = None, unit = "millions",
        granularity = "day", group_by = "category",
    ))]
    #[allow(clippy::too_many_arguments)]
    fn demand_category_time(
        &self,
        countries: Vec<String>,
        categories: Vec<String>,
        start: Option<String>,
        end: Option<String>,
        unit: &str,
        granularity: &str,
        group_by: &str,
    ) -> PyResult<PyDataFrame> {
        let filter = self.filter(start, end, unit, granularity, group_by, "gross")?;
        Ok(PyDataFrame(
            self.engine.demand_category_time(&filter, &countries, &categories)?,
        ))
    }

    #[pyo3(signature = (countries, categories, years = Vec::new(), end = None, unit = "millions", granularity = "day"))]
    fn demand_category_compare(
        &self,
        countries: Vec<String>,
        categories: Vec<String>,
        years: Vec<i32>,
        end: Option<String>,
        unit: &str,
        granularity: &str,
    ) -> PyResult<BTreeMap<String, PyDataFrame>> {
        let filter = self.filter(None, end, unit, granularity, "sum", "gross")?;
        Ok(bundle_to_py(self.engine.demand_category_compare(
            &filter,
            &countries,
            &categories,
            &years,
        )?))
    }

    // ── LNG ─────────────────────────────────────────────────────────────────

    #[pyo3(signature = (countries, start = None, end = None, unit = "millions", granularity = "day", group_by = "point"))]
    fn lng_time(
        &self,
        countries: Vec<String>,
        start: Option<String>,
        end: Option<String>,
        unit: &str,
        granularity: &str,
        group_by: &str,
    ) -> PyResult<PyDataFrame> {
        let filter = self.filter(start, end, unit, granularity, group_by, "gross")?;
        Ok(PyDataFrame(self.engine.lng_time(&filter, &countries)?))
    }

    #[pyo3(signature = (countries, years = Vec::new(), end = None, unit = "millions", granularity = "day"))]
    fn lng_compare(
        &self,
        countries: Vec<String>,
        years: Vec<i32>,
        end: Option<String>,
        unit: &str,
        granularity: &str,
    ) -> PyResult<BTreeMap<String, PyDataFrame>> {
        let filter = self.filter(None, end, unit, granularity, "sum", "gross")?;
        Ok(bundle_to_py(self.engine.lng_compare(&filter, &countries, &years)?))
    }

    // ── Current view ────────────────────────────────────────────────────────

    /// The last published result as one frame, or None before any query.
    fn last_result(&self) -> PyResult<Option<PyDataFrame>> {
        Ok(self.engine.results().latest_frame()?.map(PyDataFrame))
    }

    /// Id of the query that produced the last result.
    fn last_query_id(&self) -> Option<String> {
        self.engine.last_result().map(|s| s.query_id.to_string())
    }

    fn export_csv(&self, path: &str) -> PyResult<bool> {
        Ok(self.engine.results().export_csv(path)?)
    }

    fn export_parquet(&self, path: &str) -> PyResult<bool> {
        Ok(self.engine.results().export_parquet(path)?)
    }
}

/// Export schema constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Flow rows and series
    let flow = PyModule::new(m.py(), "flow")?;
    flow.add("COUNTRY_FROM", schema::flow::COUNTRY_FROM)?;
    flow.add("COUNTRY_TO", schema::flow::COUNTRY_TO)?;
    flow.add("POINT", schema::flow::POINT)?;
    flow.add("POINT_TYPE", schema::flow::POINT_TYPE)?;
    flow.add("CATEGORY", schema::flow::CATEGORY)?;
    flow.add("PERIOD_FROM", schema::flow::PERIOD_FROM)?;
    flow.add("PERIOD", schema::flow::PERIOD)?;
    flow.add("VOLUME", schema::flow::VOLUME)?;
    flow.add("GAS_ENERGY", schema::flow::GAS_ENERGY)?;
    flow.add("COUNTRY", schema::flow::COUNTRY)?;
    m.add_submodule(&flow)?;

    // Comparison bundles
    let compare = PyModule::new(m.py(), "compare")?;
    compare.add("YEAR", schema::compare::YEAR)?;
    compare.add("GROUP_BY", schema::compare::GROUP_BY)?;
    compare.add("FLAG", schema::compare::FLAG)?;
    compare.add("MIN", schema::compare::MIN)?;
    compare.add("MAX", schema::compare::MAX)?;
    m.add_submodule(&compare)?;

    // Weather
    let weather = PyModule::new(m.py(), "weather")?;
    weather.add("DATE", schema::weather::DATE)?;
    weather.add("TEMPERATURE", schema::weather::TEMPERATURE)?;
    weather.add("FORECAST", schema::weather::FORECAST)?;
    m.add_submodule(&weather)?;

    // Store
    let store = PyModule::new(m.py(), "store")?;
    store.add("PERIOD_FROM", schema::store::PERIOD_FROM)?;
    store.add("GAS_ENERGY", schema::store::GAS_ENERGY)?;
    store.add("GCV_VALUE", schema::store::GCV_VALUE)?;
    m.add_submodule(&store)?;

    Ok(())
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    init_logging();
    m.add_class::<PyFlowEngine>()?;
    add_schema_exports(m)?;
    Ok(())
}
