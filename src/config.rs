//! Engine configuration and logging bootstrap.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::FlowError;
use crate::granularity::Locale;

/// Tunables of the engine. Every field has a default, so a JSON file only
/// needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Default window shown when no start date is given.
    #[serde(default = "default_lookback_months")]
    pub lookback_months: u32,

    /// Years compared when the caller passes none.
    #[serde(default = "default_compare_years")]
    pub compare_years: Vec<i32>,

    /// Min/max envelopes use years strictly before this one.
    #[serde(default = "default_baseline_cutoff_year")]
    pub baseline_cutoff_year: i32,

    /// First day fetched by comparison views.
    #[serde(default = "default_history_start")]
    pub history_start: NaiveDate,

    /// kWh per m³ used when a row has no usable gcv.
    #[serde(default = "default_fallback_gcv")]
    pub fallback_gcv: f64,

    /// Decimals kept on each daily volume.
    #[serde(default = "default_volume_decimals")]
    pub volume_decimals: u32,

    #[serde(default)]
    pub locale: Locale,
}

fn default_lookback_months() -> u32 {
    3
}

fn default_compare_years() -> Vec<i32> {
    vec![2021, 2022]
}

fn default_baseline_cutoff_year() -> i32 {
    2020
}

fn default_history_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default()
}

fn default_fallback_gcv() -> f64 {
    11.4
}

fn default_volume_decimals() -> u32 {
    2
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookback_months: default_lookback_months(),
            compare_years: default_compare_years(),
            baseline_cutoff_year: default_baseline_cutoff_year(),
            history_start: default_history_start(),
            fallback_gcv: default_fallback_gcv(),
            volume_decimals: default_volume_decimals(),
            locale: Locale::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, FlowError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), FlowError> {
        if !(self.fallback_gcv > 0.0) {
            return Err(FlowError::InvalidArgument(format!(
                "fallback_gcv must be positive, got {}",
                self.fallback_gcv
            )));
        }
        Ok(())
    }
}

/// Install a fmt subscriber filtered by `RUST_LOG` (default `gasflow=info`).
///
/// Safe to call more than once; only the first call installs anything.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gasflow=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"lookback_months": 6, "locale": "en"}"#).unwrap();
        assert_eq!(config.lookback_months, 6);
        assert_eq!(config.locale, Locale::En);
        assert_eq!(config.baseline_cutoff_year, 2020);
        assert_eq!(config.history_start, NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
    }

    #[test]
    fn rejects_non_positive_gcv() {
        assert!(EngineConfig::from_json_str(r#"{"fallback_gcv": 0}"#).is_err());
    }

    #[test]
    fn init_logging_twice_is_harmless() {
        init_logging();
        init_logging();
    }
}
