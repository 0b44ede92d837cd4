use crate::enums::OrderSide;
use crate::error::CoreError;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A single observation on a chart series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub time: DateTime<Utc>,
    pub value: Decimal,
}

impl ChartPoint {
    pub fn new(time: DateTime<Utc>, value: Decimal) -> Self {
        Self { time, value }
    }
}

/// The receipt for a filled order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub execution_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub fee: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Execution {
    pub fn new(
        symbol: impl Into<String>,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
        fee: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            symbol: symbol.into(),
            side,
            price,
            quantity,
            fee,
            timestamp,
        }
    }

    /// Absolute traded value of the fill.
    pub fn notional(&self) -> Decimal {
        (self.price * self.quantity).abs()
    }
}

/// A completed round trip: the execution that opened a position and the one
/// that closed it (or the part of it that was closed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: Uuid,
    pub symbol: String,
    pub entry_execution: Execution,
    pub exit_execution: Execution,
}

impl Trade {
    /// Pairs an entry with its exit. Both legs must be on the same symbol and
    /// on opposite sides.
    pub fn new(entry_execution: Execution, exit_execution: Execution) -> Result<Self, CoreError> {
        if entry_execution.symbol != exit_execution.symbol {
            return Err(CoreError::MismatchedTrade(format!(
                "entry on {} but exit on {}",
                entry_execution.symbol, exit_execution.symbol
            )));
        }
        if entry_execution.side == exit_execution.side {
            return Err(CoreError::MismatchedTrade(format!(
                "both legs of {} are {:?}",
                entry_execution.symbol, entry_execution.side
            )));
        }

        Ok(Self {
            trade_id: Uuid::new_v4(),
            symbol: entry_execution.symbol.clone(),
            entry_execution,
            exit_execution,
        })
    }

    /// Realized profit of the round trip net of both legs' fees.
    ///
    /// The exit quantity is used as the traded size, so a partial close only
    /// accounts for the closed part of the position.
    pub fn profit_loss(&self) -> Decimal {
        let quantity = self.exit_execution.quantity;
        let gross = match self.entry_execution.side {
            OrderSide::Buy => (self.exit_execution.price - self.entry_execution.price) * quantity,
            OrderSide::Sell => (self.entry_execution.price - self.exit_execution.price) * quantity,
        };
        gross - self.total_fees()
    }

    pub fn total_fees(&self) -> Decimal {
        self.entry_execution.fee + self.exit_execution.fee
    }

    pub fn duration(&self) -> Duration {
        self.exit_execution.timestamp - self.entry_execution.timestamp
    }

    pub fn is_win(&self) -> bool {
        self.profit_loss() > Decimal::ZERO
    }
}

/// Realized profit/loss keyed by the time it was realized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfitLossLedger {
    entries: BTreeMap<DateTime<Utc>, Decimal>,
}

impl ProfitLossLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `profit_loss` at `time`. Amounts realized at the same instant are summed.
    pub fn record(&mut self, time: DateTime<Utc>, profit_loss: Decimal) {
        *self.entries.entry(time).or_insert(Decimal::ZERO) += profit_loss;
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn total(&self) -> Decimal {
        self.entries.values().copied().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DateTime<Utc>, &Decimal)> {
        self.entries.iter()
    }
}

impl FromIterator<(DateTime<Utc>, Decimal)> for ProfitLossLedger {
    fn from_iter<I: IntoIterator<Item = (DateTime<Utc>, Decimal)>>(iter: I) -> Self {
        let mut ledger = Self::new();
        for (time, profit_loss) in iter {
            ledger.record(time, profit_loss);
        }
        ledger
    }
}
