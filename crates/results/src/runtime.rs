use crate::collaborators::PortfolioValuation;
use crate::rounding::{format_number, format_percent};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Label → display string, ready to be shown as-is.
pub type RuntimeStatistics = BTreeMap<String, String>;

pub const PROBABILISTIC_SHARPE_RATIO: &str = "Probabilistic Sharpe Ratio";
pub const UNREALIZED: &str = "Unrealized";
pub const FEES: &str = "Fees";
pub const NET_PROFIT: &str = "Net Profit";
pub const RETURN: &str = "Return";
pub const EQUITY: &str = "Equity";
pub const HOLDINGS: &str = "Holdings";
pub const VOLUME: &str = "Volume";

/// The keys recomputed from the live portfolio on every build.
pub const LIVE_KEYS: [&str; 7] = [UNREALIZED, FEES, NET_PROFIT, RETURN, EQUITY, HOLDINGS, VOLUME];

/// Change of the portfolio value relative to where it started, as a ratio.
/// Zero when there is no positive starting value to compare against.
pub fn net_return(total_portfolio_value: Decimal, starting_portfolio_value: Decimal) -> Decimal {
    if starting_portfolio_value > Decimal::ZERO {
        (total_portfolio_value - starting_portfolio_value) / starting_portfolio_value
    } else {
        Decimal::ZERO
    }
}

/// Builds the runtime statistics shown while an algorithm runs.
///
/// Starts from `base`, carries the probabilistic Sharpe ratio over from the
/// last statistics `summary` (`0%` when there is none yet) and then overwrites
/// every live key from the portfolio as it is right now.
pub fn build_runtime_statistics(
    portfolio: &dyn PortfolioValuation,
    starting_portfolio_value: Decimal,
    summary: &BTreeMap<String, String>,
    base: Option<&RuntimeStatistics>,
) -> RuntimeStatistics {
    let mut statistics = base.cloned().unwrap_or_default();

    let psr = summary
        .get(PROBABILISTIC_SHARPE_RATIO)
        .cloned()
        .unwrap_or_else(|| "0%".to_string());
    statistics.insert(PROBABILISTIC_SHARPE_RATIO.to_string(), psr);

    let money = |value: Decimal| format!("${}", format_number(value));
    let total = portfolio.total_portfolio_value();

    statistics.insert(UNREALIZED.to_string(), money(portfolio.total_unrealized_profit()));
    statistics.insert(FEES.to_string(), format!("-${}", format_number(portfolio.total_fees())));
    statistics.insert(NET_PROFIT.to_string(), money(portfolio.total_profit()));
    statistics.insert(RETURN.to_string(), format_percent(net_return(total, starting_portfolio_value)));
    statistics.insert(EQUITY.to_string(), money(total));
    statistics.insert(HOLDINGS.to_string(), money(portfolio.total_holdings_value()));
    statistics.insert(VOLUME.to_string(), money(portfolio.total_sale_volume()));

    statistics
}
