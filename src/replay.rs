//! Replays a tick file through the simulated account and the results handler.

use anyhow::{Context, Result, ensure};
use chrono::{DateTime, Utc};
use core_types::OrderSide;
use executor::{OrderRequest, SharedPortfolio, SimulatedExecutor};
use results::{ResultsHandler, SeriesBenchmark};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use tracing::Span;
use tracing_indicatif::span_ext::IndicatifSpanExt;

/// One row of a tick file.
///
/// ```text
/// timestamp,symbol,price,benchmark,side,quantity
/// 2024-01-02T14:30:00Z,BTCUSDT,42000.5,4742.8,Buy,0.5
/// 2024-01-02T15:30:00Z,BTCUSDT,42110,,,
/// ```
///
/// `benchmark` is the benchmark's value at that time, if known. A row with both
/// `side` and `quantity` places a market order filled at `price`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub price: Decimal,
    #[serde(default)]
    pub benchmark: Option<Decimal>,
    #[serde(default)]
    pub side: Option<OrderSide>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
}

impl Tick {
    fn order(&self) -> Option<OrderRequest> {
        match (self.side, self.quantity) {
            (Some(side), Some(quantity)) => Some(OrderRequest::new(self.symbol.clone(), side, quantity)),
            _ => None,
        }
    }
}

/// Reads every tick from a CSV file. Timestamps must not go backwards.
pub fn read_ticks(path: &Path) -> Result<Vec<Tick>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open tick file {}", path.display()))?;

    let mut ticks: Vec<Tick> = Vec::new();
    for (row, record) in reader.deserialize::<Tick>().enumerate() {
        let tick = record.with_context(|| format!("Invalid tick on data row {}", row + 1))?;
        if let Some(previous) = ticks.last() {
            ensure!(
                tick.timestamp >= previous.timestamp,
                "Tick on data row {} at {} is earlier than the one before it ({})",
                row + 1,
                tick.timestamp,
                previous.timestamp
            );
        }
        ticks.push(tick);
    }
    Ok(ticks)
}

/// The benchmark observations carried by the ticks.
pub fn benchmark_series(ticks: &[Tick]) -> SeriesBenchmark {
    ticks
        .iter()
        .filter_map(|tick| tick.benchmark.map(|value| (tick.timestamp, value)))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    pub ticks: usize,
    pub fills: usize,
    pub rejected_orders: usize,
    pub closed_trades: usize,
    pub last_time: Option<DateTime<Utc>>,
    pub interrupted: bool,
}

pub struct Replay<'a> {
    pub handler: &'a ResultsHandler,
    pub portfolio: &'a SharedPortfolio,
    pub executor: &'a SimulatedExecutor,
    /// Take a forced sample at the last tick so the final partial day is charted.
    pub force_final_sample: bool,
}

impl Replay<'_> {
    /// Feeds `ticks` in order. Each tick is sampled before its price and fills
    /// are applied, so an organic sample records the previous day's close. The
    /// first tick is force-sampled so the curves open at the starting value.
    ///
    /// Stops early, without error, once the handler's exit flag is raised.
    /// Rejected orders are logged and skipped.
    pub fn run(&self, ticks: &[Tick]) -> Result<ReplaySummary> {
        let exit = self.handler.exit_flag();
        let progress = Span::current();
        let mut summary = ReplaySummary::default();

        for tick in ticks {
            if exit.is_requested() {
                tracing::warn!(processed = summary.ticks, "Exit requested, stopping the replay");
                summary.interrupted = true;
                break;
            }

            let opening = summary.ticks == 0;
            self.handler
                .sample(tick.timestamp, opening)
                .with_context(|| format!("Sampling failed at {}", tick.timestamp))?;
            self.portfolio.mark(&tick.symbol, tick.price);

            if let Some(order) = tick.order() {
                let filled = self
                    .executor
                    .execute(&order, tick.price, tick.timestamp)
                    .and_then(|execution| self.portfolio.apply(&execution));
                match filled {
                    Ok(closed) => {
                        summary.fills += 1;
                        summary.closed_trades += closed.len();
                    }
                    Err(e) => {
                        summary.rejected_orders += 1;
                        tracing::warn!(symbol = %order.symbol, time = %tick.timestamp, error = %e, "Order rejected");
                    }
                }
            }

            summary.ticks += 1;
            summary.last_time = Some(tick.timestamp);
            progress.pb_inc(1);
        }

        if self.force_final_sample {
            if let Some(time) = summary.last_time {
                self.handler.sample(time, true).context("Final sample failed")?;
            }
        }

        tracing::info!(
            ticks = summary.ticks,
            fills = summary.fills,
            rejected = summary.rejected_orders,
            "Replay finished"
        );
        Ok(summary)
    }
}
