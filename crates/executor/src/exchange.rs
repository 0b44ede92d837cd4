use crate::error::ExecutorError;
use chrono::{DateTime, Utc};
use configuration::Simulation;
use core_types::{Execution, OrderSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A market order to be filled at the next quoted price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
}

impl OrderRequest {
    pub fn new(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
        }
    }
}

/// The "virtual exchange" for replays.
///
/// It turns an order and a quoted price into an `Execution` with the fee and
/// slippage from the simulation settings. It does not touch any account
/// state; the caller applies the returned execution to the portfolio.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    params: Simulation,
}

impl SimulatedExecutor {
    pub fn new(params: Simulation) -> Self {
        Self { params }
    }

    /// The quoted price moved against the order by the configured slippage.
    fn slipped_price(&self, side: OrderSide, price: Decimal) -> Decimal {
        let slippage = price * self.params.slippage_pct;
        match side {
            OrderSide::Buy => price + slippage,
            OrderSide::Sell => price - slippage,
        }
    }

    /// Fills `order` in full at `price`.
    pub fn execute(
        &self,
        order: &OrderRequest,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Execution, ExecutorError> {
        if order.quantity <= Decimal::ZERO {
            return Err(ExecutorError::InvalidExecution {
                symbol: order.symbol.clone(),
                reason: format!("order quantity must be positive, got {}", order.quantity),
            });
        }
        if price <= Decimal::ZERO {
            return Err(ExecutorError::InvalidExecution {
                symbol: order.symbol.clone(),
                reason: format!("quoted price must be positive, got {price}"),
            });
        }

        let fill_price = self.slipped_price(order.side, price);
        let fee = fill_price * order.quantity * self.params.taker_fee_pct;
        tracing::debug!(
            symbol = %order.symbol,
            side = ?order.side,
            quantity = %order.quantity,
            quoted = %price,
            fill = %fill_price,
            %fee,
            "Simulated fill"
        );

        Ok(Execution::new(order.symbol.clone(), order.side, fill_price, order.quantity, fee, timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn executor(fee: Decimal, slippage: Decimal) -> SimulatedExecutor {
        SimulatedExecutor::new(Simulation {
            taker_fee_pct: fee,
            slippage_pct: slippage,
        })
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn fee_is_charged_on_the_fill_value() {
        let order = OrderRequest::new("BTCUSDT", OrderSide::Buy, dec!(2));
        let execution = executor(dec!(0.001), Decimal::ZERO).execute(&order, dec!(100), now()).unwrap();

        assert_eq!(execution.price, dec!(100));
        assert_eq!(execution.fee, dec!(0.2));
        assert_eq!(execution.timestamp, now());
    }

    #[test]
    fn slippage_moves_the_price_against_the_order() {
        let sim = executor(Decimal::ZERO, dec!(0.01));
        let buy = sim.execute(&OrderRequest::new("ETHUSDT", OrderSide::Buy, dec!(1)), dec!(200), now()).unwrap();
        let sell = sim.execute(&OrderRequest::new("ETHUSDT", OrderSide::Sell, dec!(1)), dec!(200), now()).unwrap();

        assert_eq!(buy.price, dec!(202));
        assert_eq!(sell.price, dec!(198));
    }

    #[test]
    fn rejects_empty_orders_and_bad_quotes() {
        let sim = executor(Decimal::ZERO, Decimal::ZERO);
        let empty = OrderRequest::new("BTCUSDT", OrderSide::Buy, Decimal::ZERO);
        let order = OrderRequest::new("BTCUSDT", OrderSide::Buy, dec!(1));

        assert!(matches!(sim.execute(&empty, dec!(1), now()), Err(ExecutorError::InvalidExecution { .. })));
        assert!(matches!(sim.execute(&order, dec!(-1), now()), Err(ExecutorError::InvalidExecution { .. })));
    }
}
