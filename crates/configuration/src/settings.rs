use crate::error::ConfigError;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub results: ResultsSettings,
    pub simulation: Simulation,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Config {
    /// Rejects values the results pipeline cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.results.starting_capital.is_sign_negative() {
            return Err(ConfigError::ValidationError(format!(
                "results.starting_capital must not be negative, got {}",
                self.results.starting_capital
            )));
        }
        if self.simulation.taker_fee_pct.is_sign_negative()
            || self.simulation.taker_fee_pct >= Decimal::ONE
        {
            return Err(ConfigError::ValidationError(format!(
                "simulation.taker_fee_pct must be in [0, 1), got {}",
                self.simulation.taker_fee_pct
            )));
        }
        if self.simulation.slippage_pct.is_sign_negative()
            || self.simulation.slippage_pct >= Decimal::ONE
        {
            return Err(ConfigError::ValidationError(format!(
                "simulation.slippage_pct must be in [0, 1), got {}",
                self.simulation.slippage_pct
            )));
        }
        Ok(())
    }
}

/// Parameters for the results handler.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultsSettings {
    /// Cash the replayed account starts with. Also the basis for the net return.
    pub starting_capital: Decimal,
    /// Take one forced sample at the last observed time when a run ends, so the
    /// final partial day is present on the charts.
    #[serde(default = "default_true")]
    pub force_final_sample: bool,
}

/// Contains parameters for the simulated fills.
#[derive(Debug, Clone, Deserialize)]
pub struct Simulation {
    /// The trading fees charged by the exchange for a "taker" order.
    /// 0.0004 corresponds to 0.04%.
    pub taker_fee_pct: Decimal,
    /// Adverse price move applied to every simulated fill, as a fraction of
    /// the quoted price. Buys fill higher, sells fill lower.
    #[serde(default)]
    pub slippage_pct: Decimal,
}

/// Where and how verbosely to log.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// An `EnvFilter` directive, e.g. "info" or "results=debug,info".
    #[serde(default = "default_level")]
    pub level: String,
    /// When set, logs are also written to a daily-rolling file in this directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: None,
            file_prefix: default_file_prefix(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

fn default_file_prefix() -> String {
    "vantage.log".to_string()
}
