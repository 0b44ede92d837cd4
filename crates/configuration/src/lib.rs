//! # Vantage Configuration
//!
//! Loads the strongly-typed [`Config`] from a TOML file with environment
//! overrides layered on top.

use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{Config, LogFormat, LoggingSettings, ResultsSettings, Simulation};

/// Prefix for environment overrides, e.g. `VANTAGE__RESULTS__STARTING_CAPITAL=50000`.
pub const ENV_PREFIX: &str = "VANTAGE";

/// Loads the application configuration.
///
/// Values are resolved in order of increasing precedence: built-in defaults,
/// the TOML file at `path` (optional, skipped when absent), then `VANTAGE__*`
/// environment variables. The result is validated before it is returned.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    tracing::debug!("Loading configuration from {}", path.display());

    let builder = config::Config::builder()
        .set_default("results.starting_capital", "100000")?
        .set_default("results.force_final_sample", true)?
        .set_default("simulation.taker_fee_pct", "0")?
        .set_default("simulation.slippage_pct", "0")?
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}
