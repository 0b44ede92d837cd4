use crate::error::ExecutorError;
use crate::portfolio::Portfolio;
use crate::trade_builder::TradeBuilder;
use core_types::{Execution, ProfitLossLedger, Trade};
use results::{PortfolioValuation, TradeLedger};
use rust_decimal::Decimal;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug)]
struct Account {
    portfolio: Portfolio,
    trades: TradeBuilder,
}

/// A portfolio and its trade book behind one lock, cheap to clone and share
/// between the loop that applies fills and the results handler that values
/// them.
#[derive(Debug, Clone)]
pub struct SharedPortfolio {
    inner: Arc<RwLock<Account>>,
}

impl SharedPortfolio {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Account {
                portfolio: Portfolio::new(initial_capital),
                trades: TradeBuilder::new(),
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Account> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Account> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies a fill to the portfolio and then to the trade book, returning
    /// the trades it closed. A fill the portfolio rejects is not recorded.
    pub fn apply(&self, execution: &Execution) -> Result<Vec<Trade>, ExecutorError> {
        let mut account = self.write();
        account.portfolio.update_with_execution(execution)?;
        account.trades.process_execution(execution)
    }

    pub fn mark(&self, symbol: &str, price: Decimal) {
        self.write().portfolio.mark(symbol, price);
    }

    /// A copy of the realized profit/loss ledger.
    pub fn profit_loss(&self) -> ProfitLossLedger {
        self.read().trades.profit_loss().clone()
    }

    pub fn cash(&self) -> Decimal {
        self.read().portfolio.cash
    }

    /// Runs `f` against the portfolio under the read lock.
    pub fn with_portfolio<R>(&self, f: impl FnOnce(&Portfolio) -> R) -> R {
        f(&self.read().portfolio)
    }
}

impl PortfolioValuation for SharedPortfolio {
    fn total_portfolio_value(&self) -> Decimal {
        self.read().portfolio.total_value()
    }

    fn total_unrealized_profit(&self) -> Decimal {
        self.read().portfolio.unrealized_profit()
    }

    fn total_fees(&self) -> Decimal {
        self.read().portfolio.total_fees()
    }

    /// Net of fees.
    fn total_profit(&self) -> Decimal {
        self.read().portfolio.net_profit()
    }

    fn total_holdings_value(&self) -> Decimal {
        self.read().portfolio.holdings_value()
    }

    fn total_sale_volume(&self) -> Decimal {
        self.read().portfolio.sale_volume()
    }
}

impl TradeLedger for SharedPortfolio {
    fn filled_order_count(&self) -> usize {
        self.read().trades.filled_order_count()
    }

    fn closed_trades(&self) -> Vec<Trade> {
        self.read().trades.closed_trades().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::OrderSide;
    use rust_decimal_macros::dec;

    #[test]
    fn valuation_reflects_applied_fills() {
        let shared = SharedPortfolio::new(dec!(10000));
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        shared
            .apply(&Execution::new("BTCUSDT", OrderSide::Buy, dec!(1000), dec!(2), dec!(2), time))
            .unwrap();
        shared.mark("BTCUSDT", dec!(1100));

        assert_eq!(shared.total_portfolio_value(), dec!(10198));
        assert_eq!(shared.total_unrealized_profit(), dec!(200));
        assert_eq!(shared.total_holdings_value(), dec!(2200));

        let closed = shared
            .apply(&Execution::new("BTCUSDT", OrderSide::Sell, dec!(1100), dec!(2), dec!(2), time))
            .unwrap();

        assert_eq!(closed.len(), 1);
        assert_eq!(shared.total_profit(), dec!(196));
        assert_eq!(shared.total_fees(), dec!(4));
        assert_eq!(shared.filled_order_count(), 2);
        assert_eq!(shared.closed_trades().len(), 1);
        assert_eq!(shared.profit_loss().total(), dec!(196));
        assert_eq!(shared.total_sale_volume(), dec!(4200));
    }

    #[test]
    fn rejected_fills_are_not_counted() {
        let shared = SharedPortfolio::new(dec!(10));
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        let result = shared.apply(&Execution::new("BTCUSDT", OrderSide::Buy, dec!(1000), dec!(1), Decimal::ZERO, time));

        assert!(result.is_err());
        assert_eq!(shared.filled_order_count(), 0);
        assert_eq!(shared.cash(), dec!(10));
    }

    #[test]
    fn clones_share_state() {
        let shared = SharedPortfolio::new(dec!(500));
        let other = shared.clone();
        other.mark("ETHUSDT", dec!(1));

        assert!(shared.with_portfolio(|p| p.positions().count()) == 0);
        assert_eq!(shared.total_portfolio_value(), dec!(500));
    }
}
