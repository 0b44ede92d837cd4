//! The views of the algorithm's state that the results pipeline reads.
//!
//! The results handler never mutates any of these; the portfolio, the
//! benchmark and the trade ledger are owned by the algorithm side.

use chrono::{DateTime, Utc};
use core_types::Trade;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Current valuation figures of the portfolio. Every call reflects the state
/// at the moment of the call.
pub trait PortfolioValuation: Send + Sync {
    fn total_portfolio_value(&self) -> Decimal;
    fn total_unrealized_profit(&self) -> Decimal;
    fn total_fees(&self) -> Decimal;
    fn total_profit(&self) -> Decimal;
    fn total_holdings_value(&self) -> Decimal;
    fn total_sale_volume(&self) -> Decimal;
}

/// Values the benchmark at a point in time.
pub trait Benchmark: Send + Sync {
    fn evaluate(&self, time: DateTime<Utc>) -> Decimal;
}

/// Order and trade bookkeeping.
pub trait TradeLedger: Send + Sync {
    fn filled_order_count(&self) -> usize;
    fn closed_trades(&self) -> Vec<Trade>;
}

/// A benchmark that never moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantBenchmark(pub Decimal);

impl Benchmark for ConstantBenchmark {
    fn evaluate(&self, _time: DateTime<Utc>) -> Decimal {
        self.0
    }
}

/// A benchmark backed by recorded observations. Evaluates to the latest value
/// at or before the requested time, or zero before the first observation.
#[derive(Debug, Clone, Default)]
pub struct SeriesBenchmark {
    values: BTreeMap<DateTime<Utc>, Decimal>,
}

impl SeriesBenchmark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, time: DateTime<Utc>, value: Decimal) {
        self.values.insert(time, value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(DateTime<Utc>, Decimal)> for SeriesBenchmark {
    fn from_iter<I: IntoIterator<Item = (DateTime<Utc>, Decimal)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl Benchmark for SeriesBenchmark {
    fn evaluate(&self, time: DateTime<Utc>) -> Decimal {
        self.values
            .range(..=time)
            .next_back()
            .map(|(_, value)| *value)
            .unwrap_or(Decimal::ZERO)
    }
}

/// A trade ledger with no orders, for runs that only track valuations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrades;

impl TradeLedger for NoTrades {
    fn filled_order_count(&self) -> usize {
        0
    }

    fn closed_trades(&self) -> Vec<Trade> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn series_benchmark_holds_the_last_observation() {
        let t = |h| Utc.with_ymd_and_hms(2024, 2, 1, h, 0, 0).unwrap();
        let benchmark: SeriesBenchmark = [(t(10), dec!(400)), (t(12), dec!(402))].into_iter().collect();

        assert_eq!(benchmark.evaluate(t(9)), Decimal::ZERO);
        assert_eq!(benchmark.evaluate(t(10)), dec!(400));
        assert_eq!(benchmark.evaluate(t(11)), dec!(400));
        assert_eq!(benchmark.evaluate(t(23)), dec!(402));
    }
}
