//! # Vantage Executor Crate
//!
//! This crate provides the account side of a replay: a `SimulatedExecutor`
//! that turns orders into fills, a `Portfolio` that applies those fills to
//! cash and positions, and a `TradeBuilder` that pairs fills into closed
//! trades and the realized profit/loss ledger.
//!
//! ## Architectural Principles
//!
//! - **State vs. Logic Decoupling:** The `SimulatedExecutor` is a pure
//!   calculator that determines the effects of an order (fees and slippage)
//!   without mutating state. The `Portfolio` is the state machine that applies
//!   the resulting execution to the account.
//! - **Results Integration:** `SharedPortfolio` wraps the portfolio and the
//!   trade book behind one lock and implements the `results` collaborator
//!   traits, so the results handler can value the account while fills are
//!   being applied.
//!
//! ## Public API
//!
//! - `SimulatedExecutor` / `OrderRequest`: the "virtual exchange" for replays.
//! - `Portfolio` / `Position`: the in-memory state manager for a trading account.
//! - `TradeBuilder`: FIFO pairing of fills into `Trade`s.
//! - `SharedPortfolio`: the thread-safe account handed to the results handler.
//! - `ExecutorError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod error;
pub mod exchange;
pub mod portfolio;
pub mod shared;
pub mod trade_builder;

// Re-export the key components to provide a clean, public-facing API.
pub use error::ExecutorError;
pub use exchange::{OrderRequest, SimulatedExecutor};
pub use portfolio::{Portfolio, Position};
pub use shared::SharedPortfolio;
pub use trade_builder::TradeBuilder;
