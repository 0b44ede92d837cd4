use crate::chart::{
    BENCHMARK_CHART, BENCHMARK_SERIES, ChartSnapshot, DAILY_PERFORMANCE_SERIES, EQUITY_SERIES,
    STRATEGY_EQUITY_CHART,
};
use crate::collaborators::TradeLedger;
use analytics::{StatisticsEngine, StatisticsInput, StatisticsResult};
use core_types::{ChartPoint, ProfitLossLedger};
use events::{LogLevel, LogMessage};
use rust_decimal::Decimal;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// A series the statistics need but the charts don't have (or have empty).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingSeries {
    pub chart: &'static str,
    pub series: &'static str,
}

impl fmt::Display for MissingSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no points in '{}/{}'", self.chart, self.series)
    }
}

/// How a statistics request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StatisticsOutcome {
    Complete(StatisticsResult),
    /// Nothing has been sampled yet, so there is nothing to compute from.
    MissingData(MissingSeries),
    /// The calculation itself failed; the reason has already been logged.
    Failed(String),
}

impl StatisticsOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, StatisticsOutcome::Complete(_))
    }

    pub fn result(&self) -> Option<&StatisticsResult> {
        match self {
            StatisticsOutcome::Complete(result) => Some(result),
            _ => None,
        }
    }

    /// A stream log entry for an outcome a listener should hear about:
    /// a warning for missing data, an error for a failed calculation.
    pub fn log_message(&self) -> Option<LogMessage> {
        match self {
            StatisticsOutcome::Complete(_) => None,
            StatisticsOutcome::MissingData(missing) => {
                Some(LogMessage::new(LogLevel::Warn, format!("No statistics: {missing}")))
            }
            StatisticsOutcome::Failed(reason) => {
                Some(LogMessage::new(LogLevel::Error, format!("Statistics failed: {reason}")))
            }
        }
    }

    /// The result, or an empty default one when statistics are unavailable.
    pub fn into_result(self) -> StatisticsResult {
        match self {
            StatisticsOutcome::Complete(result) => result,
            StatisticsOutcome::MissingData(_) | StatisticsOutcome::Failed(_) => StatisticsResult::default(),
        }
    }
}

/// Everything the orchestrator reads. `charts` should be a snapshot taken
/// under the chart store lock.
pub struct StatisticsRequest<'a> {
    pub charts: &'a ChartSnapshot,
    pub profit_loss: Option<&'a ProfitLossLedger>,
    pub trade_ledger: &'a dyn TradeLedger,
    pub starting_portfolio_value: Decimal,
    pub total_fees: Decimal,
}

/// Assembles the statistics inputs from the charts and the trade ledger and
/// hands them to `engine`.
///
/// Never fails and never panics: missing series and any error or panic raised
/// while extracting or calculating are reported through the outcome.
pub fn generate_statistics(request: &StatisticsRequest<'_>, engine: &dyn StatisticsEngine) -> StatisticsOutcome {
    let (equity, performance, benchmark) = match required_series(request.charts) {
        Ok(series) => series,
        Err(missing) => {
            tracing::debug!("Statistics unavailable: {missing}");
            return StatisticsOutcome::MissingData(missing);
        }
    };

    let empty_ledger = ProfitLossLedger::new();
    let profit_loss = request.profit_loss.unwrap_or(&empty_ledger);

    let computed = panic::catch_unwind(AssertUnwindSafe(|| {
        let total_transactions = request.trade_ledger.filled_order_count();
        let trades = request.trade_ledger.closed_trades();
        engine.generate(&StatisticsInput {
            trades: &trades,
            profit_loss,
            equity,
            performance,
            benchmark,
            starting_portfolio_value: request.starting_portfolio_value,
            total_fees: request.total_fees,
            total_transactions,
        })
    }));

    match computed {
        Ok(Ok(result)) => StatisticsOutcome::Complete(result),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Statistics generation failed");
            StatisticsOutcome::Failed(e.to_string())
        }
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            tracing::error!(%reason, "Statistics generation panicked");
            StatisticsOutcome::Failed(reason)
        }
    }
}

type RequiredSeries<'a> = (&'a [ChartPoint], &'a [ChartPoint], &'a [ChartPoint]);

fn required_series(charts: &ChartSnapshot) -> Result<RequiredSeries<'_>, MissingSeries> {
    let equity = non_empty(charts, STRATEGY_EQUITY_CHART, EQUITY_SERIES)?;
    let performance = non_empty(charts, STRATEGY_EQUITY_CHART, DAILY_PERFORMANCE_SERIES)?;
    let benchmark = non_empty(charts, BENCHMARK_CHART, BENCHMARK_SERIES)?;
    Ok((equity, performance, benchmark))
}

fn non_empty<'a>(
    charts: &'a ChartSnapshot,
    chart: &'static str,
    series: &'static str,
) -> Result<&'a [ChartPoint], MissingSeries> {
    charts
        .get(chart)
        .and_then(|c| c.series(series))
        .map(|s| s.points())
        .filter(|points| !points.is_empty())
        .ok_or(MissingSeries { chart, series })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{ChartStore, SampleTarget};
    use crate::collaborators::NoTrades;
    use analytics::{AnalyticsEngine, AnalyticsError};
    use chrono::{TimeZone, Utc};
    use core_types::SeriesType;
    use rust_decimal_macros::dec;

    struct RecordingEngine;

    impl StatisticsEngine for RecordingEngine {
        fn generate(&self, input: &StatisticsInput<'_>) -> Result<StatisticsResult, AnalyticsError> {
            let mut result = StatisticsResult::default();
            result.summary.insert("equity points".to_string(), input.equity.len().to_string());
            result.summary.insert("starting".to_string(), input.starting_portfolio_value.to_string());
            Ok(result)
        }
    }

    struct ErroringEngine;

    impl StatisticsEngine for ErroringEngine {
        fn generate(&self, _input: &StatisticsInput<'_>) -> Result<StatisticsResult, AnalyticsError> {
            Err(AnalyticsError::NotEnoughData("no trades".to_string()))
        }
    }

    struct PanickingEngine;

    impl StatisticsEngine for PanickingEngine {
        fn generate(&self, _input: &StatisticsInput<'_>) -> Result<StatisticsResult, AnalyticsError> {
            panic!("malformed series")
        }
    }

    fn populated(skip: Option<&str>) -> ChartSnapshot {
        let store = ChartStore::new();
        let time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let targets = [
            SampleTarget::new(STRATEGY_EQUITY_CHART, EQUITY_SERIES, 0, SeriesType::Candle),
            SampleTarget::new(STRATEGY_EQUITY_CHART, DAILY_PERFORMANCE_SERIES, 1, SeriesType::Bar),
            SampleTarget::new(BENCHMARK_CHART, BENCHMARK_SERIES, 0, SeriesType::Line),
        ];
        for target in targets.iter().filter(|t| Some(t.series) != skip) {
            store.append(target, ChartPoint::new(time, dec!(1)));
        }
        store.snapshot()
    }

    fn request(charts: &ChartSnapshot) -> StatisticsRequest<'_> {
        StatisticsRequest {
            charts,
            profit_loss: None,
            trade_ledger: &NoTrades,
            starting_portfolio_value: dec!(100000),
            total_fees: Decimal::ZERO,
        }
    }

    #[test]
    fn empty_charts_are_missing_data() {
        let charts = ChartSnapshot::new();
        let outcome = generate_statistics(&request(&charts), &AnalyticsEngine::new());

        assert_eq!(
            outcome,
            StatisticsOutcome::MissingData(MissingSeries { chart: STRATEGY_EQUITY_CHART, series: EQUITY_SERIES })
        );
        assert_eq!(outcome.into_result(), StatisticsResult::default());
    }

    #[test]
    fn each_required_series_is_checked() {
        for series in [EQUITY_SERIES, DAILY_PERFORMANCE_SERIES, BENCHMARK_SERIES] {
            let charts = populated(Some(series));
            let outcome = generate_statistics(&request(&charts), &RecordingEngine);
            match outcome {
                StatisticsOutcome::MissingData(missing) => assert_eq!(missing.series, series),
                other => panic!("expected missing {series}, got {other:?}"),
            }
        }
    }

    #[test]
    fn present_but_empty_series_counts_as_missing() {
        let mut charts = populated(None);
        let benchmark = charts.get_mut(BENCHMARK_CHART).unwrap();
        benchmark.series.insert(
            BENCHMARK_SERIES.to_string(),
            crate::chart::Series::new(BENCHMARK_SERIES, SeriesType::Line, 0, "$"),
        );

        let outcome = generate_statistics(&request(&charts), &RecordingEngine);
        assert!(matches!(outcome, StatisticsOutcome::MissingData(_)));
    }

    #[test]
    fn complete_charts_are_delegated() {
        let charts = populated(None);
        let outcome = generate_statistics(&request(&charts), &RecordingEngine);

        let result = outcome.result().unwrap();
        assert_eq!(result.summary["equity points"], "1");
        assert_eq!(result.summary["starting"], "100000");
    }

    #[test]
    fn engine_errors_become_failed() {
        let charts = populated(None);
        let outcome = generate_statistics(&request(&charts), &ErroringEngine);

        assert!(matches!(outcome, StatisticsOutcome::Failed(ref reason) if reason.contains("no trades")));
        assert!(!outcome.is_complete());
    }

    #[test]
    fn engine_panics_become_failed() {
        let charts = populated(None);
        let outcome = generate_statistics(&request(&charts), &PanickingEngine);

        assert_eq!(outcome, StatisticsOutcome::Failed("malformed series".to_string()));
        assert_eq!(outcome.into_result(), StatisticsResult::default());
    }

    #[test]
    fn degraded_outcomes_become_stream_log_entries() {
        let charts = ChartSnapshot::new();
        let missing = generate_statistics(&request(&charts), &AnalyticsEngine::new());
        let log = missing.log_message().unwrap();
        assert_eq!(log.level, LogLevel::Warn);
        assert!(log.message.contains(STRATEGY_EQUITY_CHART));

        let failed = StatisticsOutcome::Failed("engine exploded".to_string());
        let log = failed.log_message().unwrap();
        assert_eq!(log.level, LogLevel::Error);
        assert_eq!(log.message, "Statistics failed: engine exploded");

        let complete = generate_statistics(&request(&populated(None)), &RecordingEngine);
        assert!(complete.log_message().is_none());
    }
}
