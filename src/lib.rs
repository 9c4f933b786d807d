//! Data-preparation engine behind the gas-flow dashboard: selects per-point
//! flow tables, fetches and labels their daily rows, aggregates them into
//! time series and builds net-flow and year-over-year comparison views.

pub mod aggregate;
pub mod combine;
pub mod config;
pub mod error;
pub mod fetch;
pub mod granularity;
pub mod lookup;
pub mod publish;
pub mod query;
pub mod schema;
pub mod selector;
pub mod store;
pub mod table_id;
pub mod weather;

#[cfg(feature = "python")]
mod python;

pub use aggregate::{aggregate, GroupKey, GroupSpec, Reduction};
pub use combine::{compare, comparison_series, net_flow, ComparisonBundle};
pub use config::{init_logging, EngineConfig};
pub use error::FlowError;
pub use fetch::{FetchWindow, RowFetcher};
pub use granularity::{Granularity, Locale};
pub use lookup::{Lookup, LookupDocument};
pub use publish::{ResultCache, ResultView, Snapshot};
pub use query::{
    FlowEngine, FlowType, GroupBy, QueryFilter, QueryFilterBuilder, SupplySelection, Unit,
};
pub use selector::FlowKind;
pub use store::{CsvStore, DailyRecord, FlowStore, MemoryStore, SqliteStore};
pub use table_id::TableId;
pub use weather::WeatherSource;
