use crate::error::AnalyticsError;
use crate::report::{PerformanceReport, StatisticsResult};
use core_types::{ChartPoint, ProfitLossLedger, Trade};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

/// Trading days per year, used to annualise the daily Sharpe ratio.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const SECONDS_PER_YEAR: f64 = 365.25 * 86_400.0;

/// Everything a statistics run is computed from.
///
/// The three curves are the sampled chart series in arrival order: portfolio
/// equity, daily performance in percent, and the benchmark valuation.
#[derive(Debug, Clone, Copy)]
pub struct StatisticsInput<'a> {
    pub trades: &'a [Trade],
    pub profit_loss: &'a ProfitLossLedger,
    pub equity: &'a [ChartPoint],
    pub performance: &'a [ChartPoint],
    pub benchmark: &'a [ChartPoint],
    pub starting_portfolio_value: Decimal,
    pub total_fees: Decimal,
    pub total_transactions: usize,
}

/// A calculator that turns a run's curves and trades into a statistics report.
///
/// Implementations must be pure: the same input always yields the same result.
pub trait StatisticsEngine: Send + Sync {
    fn generate(&self, input: &StatisticsInput<'_>) -> Result<StatisticsResult, AnalyticsError>;
}

/// A stateless calculator for deriving performance metrics from trading activity.
#[derive(Debug, Default)]
pub struct AnalyticsEngine {}

impl StatisticsEngine for AnalyticsEngine {
    fn generate(&self, input: &StatisticsInput<'_>) -> Result<StatisticsResult, AnalyticsError> {
        let report = self.calculate(input)?;
        Ok(StatisticsResult::from_report(report))
    }
}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The main entry point for calculating performance metrics.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `PerformanceReport` or an `AnalyticsError` when
    /// the equity curve is empty or a metric cannot be represented.
    pub fn calculate(&self, input: &StatisticsInput<'_>) -> Result<PerformanceReport, AnalyticsError> {
        if input.equity.is_empty() {
            return Err(AnalyticsError::NotEnoughData("equity curve is empty".to_string()));
        }

        let mut report = PerformanceReport::new();
        report.total_fees = input.total_fees;
        report.total_orders = input.total_transactions;

        self.calculate_profitability(input.trades, &mut report);
        self.calculate_realized(input.profit_loss, &mut report);
        self.calculate_time_metrics(input.trades, &mut report);
        self.calculate_equity_metrics(input.equity, input.starting_portfolio_value, &mut report)?;
        self.calculate_drawdown(input.equity, &mut report);
        self.calculate_ratios(input.performance, input.benchmark, &mut report)?;

        tracing::debug!(
            trades = report.total_trades,
            realized = %report.realized_profit,
            "Statistics calculated over {} equity points",
            input.equity.len()
        );

        Ok(report)
    }

    /// Calculates all trade-level profitability metrics.
    fn calculate_profitability(&self, trades: &[Trade], report: &mut PerformanceReport) {
        report.total_trades = trades.len();

        for trade in trades {
            let pnl = trade.profit_loss();
            report.total_net_profit += pnl;

            if pnl.is_sign_positive() && !pnl.is_zero() {
                report.gross_profit += pnl;
                report.winning_trades += 1;
            } else {
                report.gross_loss += pnl.abs();
                report.losing_trades += 1;
            }
        }

        // --- Ratios ---
        if report.gross_loss > Decimal::ZERO {
            report.profit_factor = Some(report.gross_profit / report.gross_loss);
        }

        if report.total_trades > 0 {
            let total = Decimal::from(report.total_trades);
            report.win_rate_pct =
                Some(Decimal::from(report.winning_trades) / total * Decimal::ONE_HUNDRED);
            report.loss_rate_pct =
                Some(Decimal::from(report.losing_trades) / total * Decimal::ONE_HUNDRED);
        }

        if report.winning_trades > 0 {
            report.average_win = report.gross_profit / Decimal::from(report.winning_trades);
        }

        if report.losing_trades > 0 {
            report.average_loss = report.gross_loss / Decimal::from(report.losing_trades);
            if report.average_loss > Decimal::ZERO {
                report.payoff_ratio = Some(report.average_win / report.average_loss);
            }
        }
    }

    /// Realized profit from the ledger. The largest realized loss is the most
    /// negative amount booked at one instant, zero when nothing lost.
    fn calculate_realized(&self, ledger: &ProfitLossLedger, report: &mut PerformanceReport) {
        report.realized_profit = ledger.total();
        report.largest_realized_loss = ledger
            .iter()
            .map(|(_, pnl)| *pnl)
            .filter(|pnl| pnl.is_sign_negative())
            .min()
            .unwrap_or(Decimal::ZERO);
    }

    /// Start/end equity, total return and compounding annual return.
    fn calculate_equity_metrics(
        &self,
        equity: &[ChartPoint],
        starting_value: Decimal,
        report: &mut PerformanceReport,
    ) -> Result<(), AnalyticsError> {
        let (first, last) = match (equity.first(), equity.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Ok(()),
        };

        report.start_equity = if starting_value > Decimal::ZERO { starting_value } else { first.value };
        report.end_equity = last.value;

        if report.start_equity <= Decimal::ZERO {
            return Ok(());
        }

        let growth = report.end_equity / report.start_equity;
        report.total_return_pct = (growth - Decimal::ONE) * Decimal::ONE_HUNDRED;

        let years = (last.time - first.time).num_seconds() as f64 / SECONDS_PER_YEAR;
        if years > 0.0 && !growth.is_sign_negative() {
            let growth = to_f64("compounding annual return", growth)?;
            let car = (growth.powf(1.0 / years) - 1.0) * 100.0;
            // Very short runs can annualise past what a Decimal holds.
            report.compounding_annual_return_pct = Decimal::from_f64(car);
        }

        Ok(())
    }

    /// Calculates maximum drawdown from the equity curve.
    fn calculate_drawdown(&self, equity: &[ChartPoint], report: &mut PerformanceReport) {
        let Some(first) = equity.first() else {
            return;
        };

        let mut peak_equity = first.value;
        let mut max_drawdown = Decimal::ZERO;
        let mut max_drawdown_pct = Decimal::ZERO;

        for point in equity {
            if point.value > peak_equity {
                peak_equity = point.value;
            }
            let drawdown = peak_equity - point.value;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
            if peak_equity > Decimal::ZERO {
                let pct = drawdown / peak_equity * Decimal::ONE_HUNDRED;
                if pct > max_drawdown_pct {
                    max_drawdown_pct = pct;
                }
            }
        }

        report.max_drawdown = max_drawdown;
        report.max_drawdown_pct = max_drawdown_pct;
    }

    /// Calculates all ratio-based metrics: Sharpe, probabilistic Sharpe, Calmar and beta.
    fn calculate_ratios(
        &self,
        performance: &[ChartPoint],
        benchmark: &[ChartPoint],
        report: &mut PerformanceReport,
    ) -> Result<(), AnalyticsError> {
        // --- Calmar Ratio ---
        if report.max_drawdown_pct > Decimal::ZERO {
            report.calmar_ratio = report
                .compounding_annual_return_pct
                .map(|car| car / report.max_drawdown_pct);
        }

        // Daily performance is recorded in percent.
        let returns = performance
            .iter()
            .map(|p| to_f64("daily performance", p.value / Decimal::ONE_HUNDRED))
            .collect::<Result<Vec<f64>, _>>()?;

        if let Some(moments) = Moments::of(&returns) {
            if moments.std_dev > 0.0 {
                let sharpe = moments.mean / moments.std_dev;
                report.sharpe_ratio =
                    Some(from_f64("sharpe ratio", sharpe * TRADING_DAYS_PER_YEAR.sqrt())?);
                report.probabilistic_sharpe_ratio = probabilistic_sharpe_ratio(sharpe, 0.0, &moments)
                    .map(|psr| from_f64("probabilistic sharpe ratio", psr))
                    .transpose()?;
            }
        }

        report.beta = beta(&returns, benchmark)?
            .map(|b| from_f64("beta", b))
            .transpose()?;

        Ok(())
    }

    /// Calculates time-based metrics.
    fn calculate_time_metrics(&self, trades: &[Trade], report: &mut PerformanceReport) {
        if trades.is_empty() {
            return;
        }

        let total_duration_secs: i64 = trades.iter().map(|t| t.duration().num_seconds()).sum();
        let avg_secs = total_duration_secs / trades.len() as i64;
        report.average_holding_period =
            std::time::Duration::from_secs(u64::try_from(avg_secs).unwrap_or_default());
    }
}

/// Population moments of a return series.
#[derive(Debug, Clone, Copy)]
struct Moments {
    n: usize,
    mean: f64,
    std_dev: f64,
    skewness: f64,
    kurtosis: f64,
}

impl Moments {
    fn of(values: &[f64]) -> Option<Self> {
        let n = values.len();
        if n < 2 {
            return None;
        }

        let count = n as f64;
        let mean = values.iter().sum::<f64>() / count;
        let central = |power: i32| values.iter().map(|v| (v - mean).powi(power)).sum::<f64>() / count;

        let variance = central(2);
        let std_dev = variance.sqrt();
        let (skewness, kurtosis) = if std_dev > 0.0 {
            (central(3) / std_dev.powi(3), central(4) / variance.powi(2))
        } else {
            (0.0, 3.0)
        };

        Some(Self { n, mean, std_dev, skewness, kurtosis })
    }
}

/// Probability that the true Sharpe ratio exceeds `benchmark_sharpe`, given the
/// observed (non-annualised) `sharpe` and the higher moments of the returns.
fn probabilistic_sharpe_ratio(sharpe: f64, benchmark_sharpe: f64, moments: &Moments) -> Option<f64> {
    let denominator =
        1.0 - moments.skewness * sharpe + (moments.kurtosis - 1.0) / 4.0 * sharpe.powi(2);
    if denominator <= 0.0 {
        return None;
    }

    let z = (sharpe - benchmark_sharpe) * ((moments.n - 1) as f64).sqrt() / denominator.sqrt();
    Some(normal_cdf(z))
}

/// Beta of the strategy's daily returns against the benchmark's day-over-day returns.
///
/// Performance point `i` is paired with the benchmark move from `i - 1` to `i`;
/// days where the previous benchmark value is zero are skipped.
fn beta(returns: &[f64], benchmark: &[ChartPoint]) -> Result<Option<f64>, AnalyticsError> {
    let mut pairs = Vec::new();
    for (i, window) in benchmark.windows(2).enumerate() {
        let Some(strategy_return) = returns.get(i + 1) else {
            break;
        };
        if window[0].value.is_zero() {
            continue;
        }
        let benchmark_return = to_f64("beta", (window[1].value - window[0].value) / window[0].value)?;
        pairs.push((*strategy_return, benchmark_return));
    }

    if pairs.len() < 2 {
        return Ok(None);
    }

    let count = pairs.len() as f64;
    let mean_s = pairs.iter().map(|p| p.0).sum::<f64>() / count;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / count;
    let covariance = pairs.iter().map(|p| (p.0 - mean_s) * (p.1 - mean_b)).sum::<f64>() / count;
    let variance = pairs.iter().map(|p| (p.1 - mean_b) * (p.1 - mean_b)).sum::<f64>() / count;

    if variance <= 0.0 {
        return Ok(None);
    }
    Ok(Some(covariance / variance))
}

/// Standard normal CDF (Abramowitz & Stegun 7.1.26, |error| < 7.5e-8).
fn normal_cdf(x: f64) -> f64 {
    let z = x.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + 0.327_591_1 * z);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    let erf = 1.0 - poly * (-z * z).exp();
    if x >= 0.0 { 0.5 * (1.0 + erf) } else { 0.5 * (1.0 - erf) }
}

fn to_f64(metric: &str, value: Decimal) -> Result<f64, AnalyticsError> {
    value
        .to_f64()
        .ok_or_else(|| AnalyticsError::calculation(metric, format!("{value} has no f64 form")))
}

fn from_f64(metric: &str, value: f64) -> Result<Decimal, AnalyticsError> {
    Decimal::from_f64(value)
        .ok_or_else(|| AnalyticsError::calculation(metric, format!("{value} is not a finite decimal")))
}
