//! Shared fixtures: a small catalog and helpers to seed daily rows.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use gasflow::{
    DailyRecord, EngineConfig, FlowEngine, FlowStore, Lookup, MemoryStore, ResultCache,
};

pub const LOOKUP_JSON: &str = r#"{
    "countries": {
        "Russia": "RU",
        "Germany": "DE",
        "Poland": "PL",
        "Norway": "NO"
    },
    "eu_alias": "EU",
    "eu_codes": ["DE", "PL"],
    "points": {
        "P1": "Greifswald",
        "P2": "Mallnow",
        "P3": "Ellund",
        "P4": "GCP Gaz-System/ONTRAS",
        "P5": "Germany Distribution",
        "P6": "Swinoujscie",
        "P7": "Germany Power"
    },
    "point_types": {
        "CTWOT": "Cross-Border Transmission/Interconnection",
        "CTWIT": "Cross-Border Transmission",
        "DISTR": "Distribution",
        "POWER": "Power Plant",
        "LNGTE": "LNG Terminal"
    },
    "supply_point_types": ["CTWOT", "CTWIT"],
    "consumer_point_types": ["DISTR", "POWER"],
    "lng_point_types": ["LNGTE"],
    "tables": [
        "RU_DE_CTWOT_ex_P1",
        "RU_PL_CTWOT_ex_P2",
        "NO_DE_CTWOT_ex_P3",
        "DE_PL_CTWIT_ex_P4",
        "DE_DE_DISTR_ex_P5",
        "DE_DE_POWER_ex_P7",
        "PL_PL_LNGTE_en_P6"
    ],
    "consumer_categories": {
        "Germany": {
            "Industry": ["DE_DE_DISTR_ex_P5"],
            "Power": ["DE_DE_POWER_ex_P7"]
        }
    },
    "group_export": {
        "Norway+Russia": ["NO_DE_CTWOT_ex_P3", "RU_DE_CTWOT_ex_P1"]
    }
}"#;

pub const GCV: f64 = 10.0;

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn lookup() -> Arc<Lookup> {
    Arc::new(Lookup::from_json_str(LOOKUP_JSON).unwrap())
}

/// Records whose volume in millions of m³ equals `volumes[i]`.
pub fn records(start: NaiveDate, volumes: &[f64]) -> Vec<DailyRecord> {
    volumes
        .iter()
        .enumerate()
        .map(|(i, v)| DailyRecord::new(start + Duration::days(i as i64), v * GCV * 1e6, Some(GCV)))
        .collect()
}

/// A store where every catalog table exists and is empty.
pub fn empty_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    for table in lookup().all_table_identifiers() {
        store.insert_records(table.as_str(), &[]).unwrap();
    }
    store
}

pub fn seed(store: &mut MemoryStore, table: &str, start: NaiveDate, volumes: &[f64]) {
    store.insert_records(table, &records(start, volumes)).unwrap();
}

pub fn engine_over(store: impl FlowStore + 'static) -> FlowEngine {
    FlowEngine::new(
        Arc::new(store),
        lookup(),
        EngineConfig::default(),
        ResultCache::new(),
    )
}

pub fn volumes(frame: &polars::prelude::DataFrame) -> Vec<f64> {
    frame
        .column("volume")
        .unwrap()
        .f64()
        .unwrap()
        .into_no_null_iter()
        .collect()
}

pub fn strings(frame: &polars::prelude::DataFrame, column: &str) -> Vec<String> {
    frame
        .column(column)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect()
}
