use crate::error::ExecutorError;
use core_types::{Execution, OrderSide, ProfitLossLedger, Trade};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

/// Pairs fills into closed round trips.
///
/// Entries are matched first-in first-out. A fill that closes several entries,
/// or only part of one, produces one `Trade` per matched piece with the fees
/// of both legs split pro rata by quantity. The realized profit of every trade
/// is recorded in a [`ProfitLossLedger`] at the closing fill's time.
///
/// A closing fill larger than the open quantity is rejected, matching
/// [`Portfolio`](crate::Portfolio): positions are reversed with two fills.
#[derive(Debug, Default)]
pub struct TradeBuilder {
    open_lots: HashMap<String, VecDeque<Execution>>,
    closed_trades: Vec<Trade>,
    filled_orders: usize,
    profit_loss: ProfitLossLedger,
}

impl TradeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one fill in and returns the trades it closed. A rejected fill is
    /// not counted and leaves the open lots untouched.
    pub fn process_execution(&mut self, execution: &Execution) -> Result<Vec<Trade>, ExecutorError> {
        let lots = self.open_lots.entry(execution.symbol.clone()).or_default();

        let opens = lots.front().is_none_or(|lot| lot.side == execution.side);
        if opens {
            lots.push_back(execution.clone());
            self.filled_orders += 1;
            return Ok(Vec::new());
        }

        let available: Decimal = lots.iter().map(|lot| lot.quantity).sum();
        if execution.quantity > available {
            return Err(ExecutorError::InvalidClosingQuantity {
                requested: execution.quantity.to_string(),
                available: available.to_string(),
            });
        }
        self.filled_orders += 1;

        let mut closed = Vec::new();
        let mut remaining = execution.clone();
        while remaining.quantity > Decimal::ZERO {
            let Some(lot) = lots.front_mut() else {
                break;
            };
            let matched = lot.quantity.min(remaining.quantity);
            let entry = split_off(lot, matched);
            let exit = split_off(&mut remaining, matched);
            if lot.quantity.is_zero() {
                lots.pop_front();
            }

            let trade = Trade::new(entry, exit)?;
            self.profit_loss.record(trade.exit_execution.timestamp, trade.profit_loss());
            closed.push(trade);
        }

        tracing::debug!(symbol = %execution.symbol, closed = closed.len(), "Trades closed");
        self.closed_trades.extend(closed.iter().cloned());
        Ok(closed)
    }

    pub fn closed_trades(&self) -> &[Trade] {
        &self.closed_trades
    }

    pub fn filled_order_count(&self) -> usize {
        self.filled_orders
    }

    pub fn profit_loss(&self) -> &ProfitLossLedger {
        &self.profit_loss
    }

    /// Quantity still open in `symbol`, signed by side.
    pub fn open_quantity(&self, symbol: &str) -> Decimal {
        self.open_lots
            .get(symbol)
            .map(|lots| {
                lots.iter()
                    .map(|lot| match lot.side {
                        OrderSide::Buy => lot.quantity,
                        OrderSide::Sell => -lot.quantity,
                    })
                    .sum()
            })
            .unwrap_or(Decimal::ZERO)
    }
}

/// Takes `quantity` (and its share of the fee) out of `execution`, returning
/// the taken part.
fn split_off(execution: &mut Execution, quantity: Decimal) -> Execution {
    let fee = if quantity == execution.quantity {
        execution.fee
    } else {
        execution.fee * quantity / execution.quantity
    };

    let mut part = execution.clone();
    part.quantity = quantity;
    part.fee = fee;

    execution.quantity -= quantity;
    execution.fee -= fee;
    part
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, hour, 0, 0).unwrap()
    }

    fn fill(side: OrderSide, price: Decimal, quantity: Decimal, fee: Decimal, hour: u32) -> Execution {
        Execution::new("ETHUSDT", side, price, quantity, fee, at(hour))
    }

    #[test]
    fn opening_fills_produce_no_trades() {
        let mut builder = TradeBuilder::new();
        let trades = builder
            .process_execution(&fill(OrderSide::Buy, dec!(10), dec!(1), Decimal::ZERO, 1))
            .unwrap();

        assert!(trades.is_empty());
        assert_eq!(builder.filled_order_count(), 1);
        assert_eq!(builder.open_quantity("ETHUSDT"), dec!(1));
        assert!(builder.profit_loss().is_empty());
    }

    #[test]
    fn closing_fill_matches_entries_first_in_first_out() {
        let mut builder = TradeBuilder::new();
        builder.process_execution(&fill(OrderSide::Buy, dec!(10), dec!(1), dec!(0.1), 1)).unwrap();
        builder.process_execution(&fill(OrderSide::Buy, dec!(12), dec!(1), dec!(0.1), 2)).unwrap();

        let trades = builder
            .process_execution(&fill(OrderSide::Sell, dec!(15), dec!(2), dec!(0.2), 3))
            .unwrap();

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].entry_execution.price, dec!(10));
        assert_eq!(trades[0].profit_loss(), dec!(4.8));
        assert_eq!(trades[1].entry_execution.price, dec!(12));
        assert_eq!(trades[1].profit_loss(), dec!(2.8));
        assert_eq!(builder.profit_loss().total(), dec!(7.6));
        assert_eq!(builder.profit_loss().len(), 1);
        assert_eq!(builder.open_quantity("ETHUSDT"), Decimal::ZERO);
        assert_eq!(builder.filled_order_count(), 3);
    }

    #[test]
    fn partial_close_splits_the_entry_fee() {
        let mut builder = TradeBuilder::new();
        builder.process_execution(&fill(OrderSide::Sell, dec!(20), dec!(4), dec!(0.4), 1)).unwrap();

        let trades = builder
            .process_execution(&fill(OrderSide::Buy, dec!(18), dec!(1), dec!(0.1), 2))
            .unwrap();

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].entry_execution.fee, dec!(0.1));
        assert_eq!(trades[0].profit_loss(), dec!(1.8));
        assert_eq!(builder.open_quantity("ETHUSDT"), dec!(-3));
    }

    #[test]
    fn oversized_close_is_rejected_without_changes() {
        let mut builder = TradeBuilder::new();
        builder.process_execution(&fill(OrderSide::Buy, dec!(10), dec!(1), Decimal::ZERO, 1)).unwrap();

        let err = builder
            .process_execution(&fill(OrderSide::Sell, dec!(11), dec!(3), Decimal::ZERO, 2))
            .unwrap_err();

        assert!(matches!(err, ExecutorError::InvalidClosingQuantity { .. }));
        assert_eq!(builder.open_quantity("ETHUSDT"), dec!(1));
        assert!(builder.closed_trades().is_empty());
        assert!(builder.profit_loss().is_empty());
        assert_eq!(builder.filled_order_count(), 1);
    }
}
