//! # Vantage Analytics Engine
//!
//! This crate turns the sampled curves and the closed trades of a run into a
//! statistics report. It acts as the "unbiased judge" of the system.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of how the
//!   curves were sampled or where the trades came from. It depends only on
//!   `core-types` (Layer 0).
//! - **Pluggable Calculation:** Callers depend on the `StatisticsEngine` trait.
//!   `AnalyticsEngine` is the stateless default implementation; any other engine
//!   can be substituted without touching the results pipeline.
//!
//! ## Public API
//!
//! - `StatisticsEngine` / `StatisticsInput`: the calculation seam and its inputs.
//! - `AnalyticsEngine`: the default implementation.
//! - `StatisticsResult` / `PerformanceReport`: the numeric report plus its display summary.
//! - `AnalyticsError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod engine;
pub mod error;
pub mod report;

// Re-export the key components to create a clean, public-facing API.
pub use engine::{AnalyticsEngine, StatisticsEngine, StatisticsInput};
pub use error::AnalyticsError;
pub use report::{PerformanceReport, StatisticsResult};
