use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// A comprehensive, standardized report of a strategy's performance.
///
/// This struct is the numeric half of a `StatisticsResult` and serves as the
/// data transfer object for performance results throughout the entire system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    // I. Core Profitability Metrics
    pub total_net_profit: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub profit_factor: Option<Decimal>, // Option<> because it can be infinite if GrossLoss is 0
    pub start_equity: Decimal,
    pub end_equity: Decimal,
    pub total_return_pct: Decimal,
    pub compounding_annual_return_pct: Option<Decimal>, // Option<> when the run spans no time
    pub realized_profit: Decimal,
    pub largest_realized_loss: Decimal,

    // II. Risk and Drawdown
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: Decimal,
    pub sharpe_ratio: Option<Decimal>, // Option<> for cases with no stdev
    pub probabilistic_sharpe_ratio: Option<Decimal>,
    pub calmar_ratio: Option<Decimal>, // Option<> for cases with no drawdown
    pub beta: Option<Decimal>,         // Option<> for a flat or missing benchmark

    // III. Trade-Level Statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: Option<Decimal>, // Option<> for cases with 0 trades
    pub loss_rate_pct: Option<Decimal>,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub payoff_ratio: Option<Decimal>, // Option<> because avg_loss can be 0
    pub total_fees: Decimal,
    pub total_orders: usize,

    // IV. Time-Based Metrics
    #[serde(with = "humantime_serde")]
    pub average_holding_period: Duration,
}

impl PerformanceReport {
    /// Creates a new, zeroed-out PerformanceReport.
    /// This is useful as a default or starting point before calculations.
    pub fn new() -> Self {
        Self {
            total_net_profit: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            profit_factor: None,
            start_equity: Decimal::ZERO,
            end_equity: Decimal::ZERO,
            total_return_pct: Decimal::ZERO,
            compounding_annual_return_pct: None,
            realized_profit: Decimal::ZERO,
            largest_realized_loss: Decimal::ZERO,
            max_drawdown: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            sharpe_ratio: None,
            probabilistic_sharpe_ratio: None,
            calmar_ratio: None,
            beta: None,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate_pct: None,
            loss_rate_pct: None,
            average_win: Decimal::ZERO,
            average_loss: Decimal::ZERO,
            payoff_ratio: None,
            total_fees: Decimal::ZERO,
            total_orders: 0,
            average_holding_period: Duration::ZERO,
        }
    }
}

impl Default for PerformanceReport {
    fn default() -> Self {
        Self::new()
    }
}

/// The output of a statistics run: the numeric report plus a flat,
/// display-ready summary keyed by label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsResult {
    pub total_performance: PerformanceReport,
    pub summary: BTreeMap<String, String>,
}

impl StatisticsResult {
    /// Builds the summary labels from a finished report.
    pub fn from_report(report: PerformanceReport) -> Self {
        let r = &report;
        let mut summary = BTreeMap::new();
        let mut put = |label: &str, value: String| {
            summary.insert(label.to_string(), value);
        };

        put("Total Orders", r.total_orders.to_string());
        put("Total Trades", r.total_trades.to_string());
        put("Average Win", money(r.average_win));
        put("Average Loss", money(-r.average_loss));
        put("Compounding Annual Return", optional_percent(r.compounding_annual_return_pct, 3));
        put("Drawdown", percent(r.max_drawdown_pct, 3));
        put("Net Profit", percent(r.total_return_pct, 3));
        put("Sharpe Ratio", optional_plain(r.sharpe_ratio, 3));
        put(
            "Probabilistic Sharpe Ratio",
            optional_percent(r.probabilistic_sharpe_ratio.map(|p| p * Decimal::ONE_HUNDRED), 3),
        );
        put("Win Rate", optional_percent(r.win_rate_pct, 0));
        put("Loss Rate", optional_percent(r.loss_rate_pct, 0));
        put("Profit-Loss Ratio", optional_plain(r.payoff_ratio, 2));
        put("Beta", optional_plain(r.beta, 3));
        put("Total Fees", money(r.total_fees));
        put("Realized Profit", money(r.realized_profit));
        put("Start Equity", money(r.start_equity));
        put("End Equity", money(r.end_equity));

        Self {
            total_performance: report,
            summary,
        }
    }
}

fn rounded(value: Decimal, dp: u32) -> Decimal {
    value
        .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

fn percent(value: Decimal, dp: u32) -> String {
    format!("{}%", rounded(value, dp))
}

fn optional_percent(value: Option<Decimal>, dp: u32) -> String {
    percent(value.unwrap_or_default(), dp)
}

fn optional_plain(value: Option<Decimal>, dp: u32) -> String {
    rounded(value.unwrap_or_default(), dp).to_string()
}

fn money(value: Decimal) -> String {
    let value = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if value.is_sign_negative() && !value.is_zero() {
        format!("-${:.2}", value.abs())
    } else {
        format!("${:.2}", value.abs())
    }
}
