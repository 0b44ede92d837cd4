//! # Vantage Events
//!
//! This crate defines the messages a live results stream carries to whoever is
//! listening: chart deltas, runtime statistics, the statistics summary and
//! structured log lines.
//!
//! As a Layer 0 crate, it depends only on `core-types`.

// Declare the modules that make up this crate.
pub mod error;
pub mod messages;

// Re-export the core types to provide a clean public API.
pub use error::EventsError;
pub use messages::{ChartUpdate, LogLevel, LogMessage, ResultMessage};
