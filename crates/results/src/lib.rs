//! # Vantage Results
//!
//! The results side of a run: it samples the equity, benchmark and daily
//! performance curves, keeps every chart the algorithm plots, builds the
//! runtime statistics shown while the algorithm runs and, on request, hands
//! the sampled curves to a statistics engine.
//!
//! ## Architectural Principles
//!
//! - **Layer 2 Logic:** This crate depends on `core-types`, `analytics` and
//!   `events`. It reads the portfolio, the benchmark and the trade ledger only
//!   through the traits in [`collaborators`], so it never knows how fills are
//!   simulated or where prices come from.
//! - **One lock per concern:** The sampling state and the chart store are each
//!   behind their own mutex. Every sample is one batch written under the store
//!   lock, and statistics run on a snapshot, so a reader never sees an equity
//!   point without its matching daily performance point.
//! - **Pluggable emission:** The sampler writes through a [`SampleEmitter`].
//!   Backtests buffer into the chart store, live runs also stream each point
//!   out as a [`events::ResultMessage`].
//!
//! ## Public API
//!
//! - `ResultsHandler` / `ResultsHandlerBuilder`: the facade a run talks to.
//! - `Sampler` / `SamplingState`: the once-per-UTC-day sampling decision.
//! - `ChartStore` / `Chart` / `Series`: the thread-safe chart collection.
//! - `generate_statistics` / `StatisticsOutcome`: the statistics orchestrator.
//! - `build_runtime_statistics`: the live display statistics.

pub mod cancellation;
pub mod chart;
pub mod collaborators;
pub mod emitter;
pub mod error;
pub mod handler;
pub mod rounding;
pub mod runtime;
pub mod sampler;
pub mod statistics;

pub use cancellation::ExitFlag;
pub use chart::{Chart, ChartSnapshot, ChartStore, Sample, SampleTarget, Series};
pub use collaborators::{Benchmark, ConstantBenchmark, NoTrades, PortfolioValuation, SeriesBenchmark, TradeLedger};
pub use emitter::{BufferedEmitter, EmitterKind, NullEmitter, SampleEmitter, StreamingEmitter};
pub use error::ResultsError;
pub use handler::{ResultsHandler, ResultsHandlerBuilder};
pub use rounding::{format_number, format_percent, smart_round};
pub use runtime::{RuntimeStatistics, build_runtime_statistics, net_return};
pub use sampler::{SampleDecision, Sampler, SamplingState, daily_performance};
pub use statistics::{MissingSeries, StatisticsOutcome, StatisticsRequest, generate_statistics};
