//! # Vantage Core Types
//!
//! The Layer 0 vocabulary shared by every other crate in the workspace: chart
//! points and series kinds, order sides, executions, closed trades and the
//! realized profit/loss ledger. This crate holds data only; it has no
//! knowledge of how points are sampled or how statistics are computed.

pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{OrderSide, SeriesType};
pub use error::CoreError;
pub use structs::{ChartPoint, Execution, ProfitLossLedger, Trade};
