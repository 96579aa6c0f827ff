// src/config.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::exhaustivity::ExpectedHours;
use crate::service::AnalyticsSettings;

pub const ENV_PREFIX: &str = "OPSDASH_";

fn default_expected_daily_hours() -> Decimal {
    dec!(8)
}

fn default_top_technicians() -> usize {
    10
}

fn default_rolling_months() -> u32 {
    12
}

/// Settings read from `OPSDASH_*` variables (and `.env`).
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    // Exhaustivity baseline
    #[serde(default = "default_expected_daily_hours")]
    pub expected_daily_hours: Decimal,
    #[serde(default)]
    pub hours_tolerance: Decimal,
    /// Public holidays, comma separated `YYYY-MM-DD`.
    #[serde(default)]
    pub rest_days: Vec<NaiveDate>,

    // Rankings
    #[serde(default = "default_top_technicians")]
    pub top_technicians: usize,
    #[serde(default = "default_rolling_months")]
    pub rolling_months: u32,

    /// JSON scorecard definition; the built-in SEP 2025 programme when unset.
    pub scorecard_config_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        envy::prefixed(ENV_PREFIX).from_env::<AppConfig>()
    }

    pub fn expected_hours(&self) -> Result<ExpectedHours, ConfigError> {
        Ok(ExpectedHours::new(self.expected_daily_hours, self.hours_tolerance)?
            .with_rest_days(self.rest_days.iter().copied()))
    }

    pub fn analytics_settings(&self) -> Result<AnalyticsSettings, ConfigError> {
        Ok(AnalyticsSettings {
            expected_hours: self.expected_hours()?,
            top_technicians: self.top_technicians,
            rolling_months: self.rolling_months,
        })
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config: AppConfig = envy::prefixed(ENV_PREFIX).from_iter(vars(&[])).unwrap();

        assert_eq!(config.expected_daily_hours, dec!(8));
        assert_eq!(config.hours_tolerance, Decimal::ZERO);
        assert_eq!(config.top_technicians, 10);
        assert_eq!(config.rolling_months, 12);
        assert!(config.rest_days.is_empty());
        assert_eq!(config.scorecard_config_path, None);
    }

    #[test]
    fn reads_prefixed_variables() {
        let config: AppConfig = envy::prefixed(ENV_PREFIX)
            .from_iter(vars(&[
                ("OPSDASH_EXPECTED_DAILY_HOURS", "7.5"),
                ("OPSDASH_HOURS_TOLERANCE", "0.25"),
                ("OPSDASH_REST_DAYS", "2025-01-01,2025-05-01"),
                ("OPSDASH_TOP_TECHNICIANS", "5"),
                ("OPSDASH_SCORECARD_CONFIG_PATH", "sep.json"),
            ]))
            .unwrap();

        assert_eq!(config.expected_daily_hours, dec!(7.5));
        assert_eq!(config.top_technicians, 5);
        assert_eq!(config.rest_days.len(), 2);
        assert_eq!(config.scorecard_config_path, Some(PathBuf::from("sep.json")));

        let expected = config.expected_hours().unwrap();
        assert_eq!(expected.tolerance(), dec!(0.25));
        assert!(expected.is_rest_day(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()));
    }

    #[test]
    fn invalid_baseline_surfaces_as_config_error() {
        let config: AppConfig = envy::prefixed(ENV_PREFIX)
            .from_iter(vars(&[("OPSDASH_EXPECTED_DAILY_HOURS", "0")]))
            .unwrap();

        assert!(matches!(
            config.analytics_settings(),
            Err(ConfigError::InvalidExpectedHours { .. })
        ));
    }
}
