use chrono::TimeDelta;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// All errors generated while loading configuration. Raised before any run begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("bankroll must be positive, got {0}")]
    NonPositiveBankroll(Decimal),

    #[error("unsupported data source: {0}")]
    UnsupportedDataSource(String),

    #[error("unknown strategy {0:?} (available: naive_favorite, value_betting)")]
    UnknownStrategy(String),
}

/// Which adaptor loads the racing dataset.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    #[default]
    Csv,
    Excel,
    Db,
}

/// Run configuration, loadable from a YAML file with command-line overrides on top.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Bankroll used when none is provided explicitly.
    pub initial_bankroll: Decimal,
    /// Adaptor used to load racing data.
    pub data_source: DataSource,
    /// Delay between a race running and its payoffs being published.
    pub payoff_delay_minutes: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            initial_bankroll: dec!(10_000),
            data_source: DataSource::default(),
            payoff_delay_minutes: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// Validate `bankroll`, falling back to the configured default.
    pub fn ensure_bankroll(&self, bankroll: Option<Decimal>) -> Result<Decimal, ConfigError> {
        let value = bankroll.unwrap_or(self.initial_bankroll);
        if value <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveBankroll(value));
        }
        Ok(value)
    }

    /// Payoff publication delay as a duration.
    pub fn payoff_delay(&self) -> TimeDelta {
        TimeDelta::minutes(self.payoff_delay_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.initial_bankroll, dec!(10_000));
        assert_eq!(config.data_source, DataSource::Csv);
        assert_eq!(config.payoff_delay(), TimeDelta::minutes(10));
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let config: AppConfig = serde_yaml::from_str("initial_bankroll: 500\n").unwrap();
        assert_eq!(config.initial_bankroll, dec!(500));
        assert_eq!(config.data_source, DataSource::Csv);
    }

    #[test]
    fn test_ensure_bankroll() {
        let config = AppConfig::default();
        assert_eq!(config.ensure_bankroll(None).unwrap(), dec!(10_000));
        assert_eq!(config.ensure_bankroll(Some(dec!(250))).unwrap(), dec!(250));
        assert!(config.ensure_bankroll(Some(dec!(0))).is_err());
    }
}
