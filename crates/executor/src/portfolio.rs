use crate::error::ExecutorError;
use chrono::{DateTime, Utc};
use core_types::{Execution, OrderSide};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

/// An open position in one symbol. Positions are never flat; a position whose
/// quantity reaches zero is removed from the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub symbol: String,
    pub side: OrderSide,
    /// Always positive; the direction is carried by `side`.
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl Position {
    fn direction(&self) -> Decimal {
        match self.side {
            OrderSide::Buy => Decimal::ONE,
            OrderSide::Sell => Decimal::NEGATIVE_ONE,
        }
    }

    /// Signed value of the position at `price`: negative for shorts.
    pub fn market_value(&self, price: Decimal) -> Decimal {
        self.direction() * self.quantity * price
    }

    pub fn unrealized_profit(&self, price: Decimal) -> Decimal {
        self.direction() * (price - self.entry_price) * self.quantity
    }
}

/// Manages the state of a trading account: cash, open positions, the last
/// known price of every symbol and the running totals the results pipeline
/// reports on.
///
/// Shorts are supported: a sell from flat credits the proceeds to cash and the
/// position is valued negatively, so the total value stays `cash + Σ signed
/// market value`.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub cash: Decimal,
    positions: HashMap<String, Position>,
    marks: HashMap<String, Decimal>,
    total_fees: Decimal,
    realized_profit: Decimal,
    sale_volume: Decimal,
}

impl Portfolio {
    /// Creates a new `Portfolio` with a given amount of starting capital.
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            cash: initial_capital,
            positions: HashMap::new(),
            marks: HashMap::new(),
            total_fees: Decimal::ZERO,
            realized_profit: Decimal::ZERO,
            sale_volume: Decimal::ZERO,
        }
    }

    /// Applies a fill to cash, positions and the running totals.
    ///
    /// The execution is checked before anything changes, so a rejected fill
    /// leaves the portfolio exactly as it was. Reducing a position by more
    /// than its size is rejected; close it first and open the other side with
    /// a second execution.
    pub fn update_with_execution(&mut self, execution: &Execution) -> Result<(), ExecutorError> {
        if execution.quantity <= Decimal::ZERO || execution.price <= Decimal::ZERO {
            return Err(ExecutorError::InvalidExecution {
                symbol: execution.symbol.clone(),
                reason: format!("price {} and quantity {} must be positive", execution.price, execution.quantity),
            });
        }

        let cost = execution.notional();
        let cash_after = match execution.side {
            OrderSide::Buy => self.cash - cost,
            OrderSide::Sell => self.cash + cost,
        } - execution.fee;

        if cash_after.is_sign_negative() {
            return Err(ExecutorError::InsufficientCash {
                required: (cost + execution.fee).to_string(),
                available: self.cash.to_string(),
            });
        }

        let symbol = &execution.symbol;
        let mut closed = false;
        match self.positions.get_mut(symbol) {
            Some(position) if position.side != execution.side => {
                if execution.quantity > position.quantity {
                    return Err(ExecutorError::InvalidClosingQuantity {
                        requested: execution.quantity.to_string(),
                        available: position.quantity.to_string(),
                    });
                }
                self.realized_profit +=
                    position.direction() * (execution.price - position.entry_price) * execution.quantity;
                position.quantity -= execution.quantity;
                position.last_updated = execution.timestamp;
                closed = position.quantity.is_zero();
            }
            Some(position) => {
                let total_quantity = position.quantity + execution.quantity;
                position.entry_price =
                    (position.entry_price * position.quantity + execution.price * execution.quantity) / total_quantity;
                position.quantity = total_quantity;
                position.last_updated = execution.timestamp;
            }
            None => {
                self.positions.insert(
                    symbol.clone(),
                    Position {
                        symbol: symbol.clone(),
                        side: execution.side,
                        quantity: execution.quantity,
                        entry_price: execution.price,
                        last_updated: execution.timestamp,
                    },
                );
            }
        }
        if closed {
            self.positions.remove(symbol);
        }

        self.cash = cash_after;
        self.total_fees += execution.fee;
        self.sale_volume += cost;
        self.marks.insert(symbol.clone(), execution.price);
        Ok(())
    }

    /// Records the latest market price of `symbol`. Open positions are valued
    /// at the latest mark, or at their entry price when none has been seen.
    pub fn mark(&mut self, symbol: &str, price: Decimal) {
        self.marks.insert(symbol.to_string(), price);
    }

    fn price_of(&self, position: &Position) -> Decimal {
        self.marks.get(&position.symbol).copied().unwrap_or(position.entry_price)
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Cash plus the signed market value of every open position.
    pub fn total_value(&self) -> Decimal {
        self.cash
            + self
                .positions
                .values()
                .map(|p| p.market_value(self.price_of(p)))
                .sum::<Decimal>()
    }

    /// Gross exposure: the absolute market value of every open position.
    pub fn holdings_value(&self) -> Decimal {
        self.positions
            .values()
            .map(|p| p.market_value(self.price_of(p)).abs())
            .sum()
    }

    pub fn unrealized_profit(&self) -> Decimal {
        self.positions
            .values()
            .map(|p| p.unrealized_profit(self.price_of(p)))
            .sum()
    }

    /// Profit realized by closing positions, before fees.
    pub fn realized_profit(&self) -> Decimal {
        self.realized_profit
    }

    /// Realized profit after every fee paid so far.
    pub fn net_profit(&self) -> Decimal {
        self.realized_profit - self.total_fees
    }

    pub fn total_fees(&self) -> Decimal {
        self.total_fees
    }

    /// Traded notional of every fill, both sides.
    pub fn sale_volume(&self) -> Decimal {
        self.sale_volume
    }
}
