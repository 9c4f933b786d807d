/// Column-name constants for every frame the engine produces.
/// Single source of truth - exported to Python via PyO3.

// ── Store columns ───────────────────────────────────────────────────────────
pub mod store {
    pub const PERIOD_FROM: &str = "period_from";
    pub const GAS_ENERGY: &str = "gas_energy";
    pub const GCV_VALUE: &str = "gcv_value";

    pub const ALL: [&str; 3] = [PERIOD_FROM, GAS_ENERGY, GCV_VALUE];
}

// ── Flow row / series columns ───────────────────────────────────────────────
pub mod flow {
    pub const COUNTRY_FROM: &str = "country_from";
    pub const COUNTRY_TO: &str = "country_to";
    pub const POINT: &str = "point";
    pub const POINT_TYPE: &str = "point_type";
    pub const CATEGORY: &str = "category";
    pub const PERIOD_FROM: &str = "period_from";
    pub const PERIOD: &str = "period";
    pub const VOLUME: &str = "volume";
    pub const GAS_ENERGY: &str = "gas_energy";
    /// Leading column of net-flow frames.
    pub const COUNTRY: &str = "country";
}

// ── Comparison columns ──────────────────────────────────────────────────────
pub mod compare {
    pub const YEAR: &str = "year";
    pub const GROUP_BY: &str = "group_by";
    pub const FLAG: &str = "flag";
    pub const MIN: &str = "min";
    pub const MAX: &str = "max";
}

// ── Weather columns ─────────────────────────────────────────────────────────
pub mod weather {
    pub const DATE: &str = "date";
    pub const TEMPERATURE: &str = "temperature";
    pub const FORECAST: &str = "forecast";
}

// ── Internal bucketing columns (never leave the engine) ─────────────────────
pub(crate) mod bucket {
    pub const KEY: &str = "_bucket";
    pub const EXPECTED_DAYS: &str = "_expected_days";
    pub const DAYS: &str = "_days";
}
