use crate::cancellation::ExitFlag;
use crate::chart::{Chart, ChartSnapshot, ChartStore, SampleTarget};
use crate::collaborators::{Benchmark, PortfolioValuation, TradeLedger};
use crate::emitter::{EmitterKind, SampleEmitter};
use crate::error::ResultsError;
use crate::runtime::{RuntimeStatistics, build_runtime_statistics};
use crate::sampler::{SampleDecision, Sampler, SamplingState};
use crate::statistics::{StatisticsOutcome, StatisticsRequest, generate_statistics};
use analytics::{AnalyticsEngine, StatisticsEngine};
use chrono::{DateTime, Utc};
use core_types::{ChartPoint, ProfitLossLedger};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The results side of a running algorithm.
///
/// Owns the chart store and the sampling state, reads the portfolio, the
/// benchmark and the trade ledger, and is shared (behind an `Arc`) between the
/// execution loop that samples and the reporting path that asks for
/// statistics.
pub struct ResultsHandler {
    store: Arc<ChartStore>,
    emitter: Box<dyn SampleEmitter>,
    sampler: Mutex<Sampler>,
    portfolio: Arc<dyn PortfolioValuation>,
    benchmark: Arc<dyn Benchmark>,
    trade_ledger: Arc<dyn TradeLedger>,
    statistics_engine: Arc<dyn StatisticsEngine>,
    starting_portfolio_value: Decimal,
    exit_flag: ExitFlag,
}

impl ResultsHandler {
    pub fn builder() -> ResultsHandlerBuilder {
        ResultsHandlerBuilder::default()
    }

    fn sampler(&self) -> MutexGuard<'_, Sampler> {
        self.sampler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Samples the equity, benchmark and daily performance curves if the UTC
    /// day changed since the previous call, or unconditionally when `force`.
    pub fn sample(&self, time: DateTime<Utc>, force: bool) -> Result<SampleDecision, ResultsError> {
        self.sampler().sample(
            time,
            force,
            self.portfolio.as_ref(),
            self.benchmark.as_ref(),
            self.emitter.as_ref(),
        )
    }

    /// Records a point on an algorithm-defined chart through the same emitter
    /// the sampler uses.
    pub fn sample_custom(&self, target: &SampleTarget<'_>, point: ChartPoint) -> Result<(), ResultsError> {
        self.emitter.emit(target, point)
    }

    /// Computes the statistics report from everything sampled so far.
    ///
    /// The charts are copied under the store lock and the engine runs on the
    /// copy, so sampling is never blocked by a statistics run.
    pub fn generate_statistics(&self, profit_loss: Option<&ProfitLossLedger>) -> StatisticsOutcome {
        let charts = self.store.snapshot();
        let request = StatisticsRequest {
            charts: &charts,
            profit_loss,
            trade_ledger: self.trade_ledger.as_ref(),
            starting_portfolio_value: self.starting_portfolio_value,
            total_fees: self.portfolio.total_fees(),
        };
        let outcome = generate_statistics(&request, self.statistics_engine.as_ref());
        if let StatisticsOutcome::MissingData(missing) = &outcome {
            tracing::warn!("Statistics requested before sampling completed: {missing}");
        }
        outcome
    }

    /// Display-ready runtime statistics for the portfolio as it is now.
    pub fn runtime_statistics(
        &self,
        summary: &BTreeMap<String, String>,
        base: Option<&RuntimeStatistics>,
    ) -> RuntimeStatistics {
        build_runtime_statistics(self.portfolio.as_ref(), self.starting_portfolio_value, summary, base)
    }

    /// A consistent copy of every chart.
    pub fn charts(&self) -> ChartSnapshot {
        self.store.snapshot()
    }

    pub fn chart_store(&self) -> &Arc<ChartStore> {
        &self.store
    }

    /// Chart deltas since the previous call, for incremental packaging.
    pub fn take_chart_updates(&self) -> Vec<Chart> {
        self.store.take_updates()
    }

    pub fn exit_flag(&self) -> ExitFlag {
        self.exit_flag.clone()
    }

    pub fn sampling_state(&self) -> SamplingState {
        self.sampler().state()
    }

    pub fn starting_portfolio_value(&self) -> Decimal {
        self.starting_portfolio_value
    }
}

enum EmitterChoice {
    Kind(EmitterKind),
    Custom(Box<dyn SampleEmitter>),
}

/// Assembles a [`ResultsHandler`]. The portfolio, benchmark and trade ledger
/// are required; everything else has a default.
#[derive(Default)]
pub struct ResultsHandlerBuilder {
    store: Option<Arc<ChartStore>>,
    emitter: Option<EmitterChoice>,
    portfolio: Option<Arc<dyn PortfolioValuation>>,
    benchmark: Option<Arc<dyn Benchmark>>,
    trade_ledger: Option<Arc<dyn TradeLedger>>,
    statistics_engine: Option<Arc<dyn StatisticsEngine>>,
    starting_portfolio_value: Option<Decimal>,
    start_time: Option<DateTime<Utc>>,
    exit_flag: Option<ExitFlag>,
}

impl ResultsHandlerBuilder {
    pub fn portfolio(mut self, portfolio: Arc<dyn PortfolioValuation>) -> Self {
        self.portfolio = Some(portfolio);
        self
    }

    pub fn benchmark(mut self, benchmark: Arc<dyn Benchmark>) -> Self {
        self.benchmark = Some(benchmark);
        self
    }

    pub fn trade_ledger(mut self, trade_ledger: Arc<dyn TradeLedger>) -> Self {
        self.trade_ledger = Some(trade_ledger);
        self
    }

    /// Defaults to [`AnalyticsEngine`].
    pub fn statistics_engine(mut self, engine: Arc<dyn StatisticsEngine>) -> Self {
        self.statistics_engine = Some(engine);
        self
    }

    /// Defaults to [`EmitterKind::Buffered`].
    pub fn emitter(mut self, kind: EmitterKind) -> Self {
        self.emitter = Some(EmitterChoice::Kind(kind));
        self
    }

    pub fn custom_emitter(mut self, emitter: Box<dyn SampleEmitter>) -> Self {
        self.emitter = Some(EmitterChoice::Custom(emitter));
        self
    }

    /// Shares an existing chart store instead of creating a new one.
    pub fn chart_store(mut self, store: Arc<ChartStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to the portfolio value at the time `build` is called.
    pub fn starting_portfolio_value(mut self, value: Decimal) -> Self {
        self.starting_portfolio_value = Some(value);
        self
    }

    /// Seeds the sampler as if the previous day had closed at `time` with the
    /// starting portfolio value. The first organic sample then waits for the
    /// next UTC day after `time` instead of landing on the Unix epoch.
    pub fn start_time(mut self, time: DateTime<Utc>) -> Self {
        self.start_time = Some(time);
        self
    }

    pub fn exit_flag(mut self, flag: ExitFlag) -> Self {
        self.exit_flag = Some(flag);
        self
    }

    pub fn build(self) -> Result<ResultsHandler, ResultsError> {
        let portfolio = self.portfolio.ok_or(ResultsError::MissingCollaborator("portfolio"))?;
        let benchmark = self.benchmark.ok_or(ResultsError::MissingCollaborator("benchmark"))?;
        let trade_ledger = self.trade_ledger.ok_or(ResultsError::MissingCollaborator("trade ledger"))?;

        let store = self.store.unwrap_or_default();
        let emitter = match self.emitter.unwrap_or(EmitterChoice::Kind(EmitterKind::Buffered)) {
            EmitterChoice::Kind(kind) => kind.into_emitter(Arc::clone(&store)),
            EmitterChoice::Custom(emitter) => emitter,
        };
        let starting_portfolio_value = self
            .starting_portfolio_value
            .unwrap_or_else(|| portfolio.total_portfolio_value());

        let sampler = match self.start_time {
            Some(time) => Sampler::with_state(SamplingState {
                previous_utc_sample_time: time,
                daily_portfolio_value: starting_portfolio_value,
            }),
            None => Sampler::new(),
        };

        tracing::info!(starting = %starting_portfolio_value, start = ?self.start_time, "Results handler ready");

        Ok(ResultsHandler {
            store,
            emitter,
            sampler: Mutex::new(sampler),
            portfolio,
            benchmark,
            trade_ledger,
            statistics_engine: self.statistics_engine.unwrap_or_else(|| Arc::new(AnalyticsEngine::new())),
            starting_portfolio_value,
            exit_flag: self.exit_flag.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{EQUITY_SERIES, STRATEGY_EQUITY_CHART};
    use crate::collaborators::{ConstantBenchmark, NoTrades};
    use crate::emitter::NullEmitter;
    use tokio::sync::mpsc;
    use chrono::TimeZone;
    use core_types::SeriesType;
    use rust_decimal_macros::dec;

    struct Flat(Decimal);

    impl PortfolioValuation for Flat {
        fn total_portfolio_value(&self) -> Decimal {
            self.0
        }
        fn total_unrealized_profit(&self) -> Decimal {
            Decimal::ZERO
        }
        fn total_fees(&self) -> Decimal {
            Decimal::ZERO
        }
        fn total_profit(&self) -> Decimal {
            Decimal::ZERO
        }
        fn total_holdings_value(&self) -> Decimal {
            Decimal::ZERO
        }
        fn total_sale_volume(&self) -> Decimal {
            Decimal::ZERO
        }
    }

    fn builder() -> ResultsHandlerBuilder {
        ResultsHandler::builder()
            .portfolio(Arc::new(Flat(dec!(5000))))
            .benchmark(Arc::new(ConstantBenchmark(dec!(1))))
            .trade_ledger(Arc::new(NoTrades))
    }

    #[test]
    fn build_requires_collaborators() {
        let err = ResultsHandler::builder().build().err().unwrap();
        assert!(matches!(err, ResultsError::MissingCollaborator("portfolio")));

        let err = ResultsHandler::builder()
            .portfolio(Arc::new(Flat(Decimal::ZERO)))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ResultsError::MissingCollaborator("benchmark")));
    }

    #[test]
    fn starting_value_defaults_to_the_current_portfolio_value() {
        let handler = builder().build().unwrap();
        assert_eq!(handler.starting_portfolio_value(), dec!(5000));

        let handler = builder().starting_portfolio_value(dec!(1)).build().unwrap();
        assert_eq!(handler.starting_portfolio_value(), dec!(1));
    }

    #[test]
    fn custom_samples_share_the_store() {
        let handler = builder().build().unwrap();
        let target = SampleTarget::new("Signals", "RSI", 0, SeriesType::Line).with_unit("");
        let time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        handler.sample_custom(&target, ChartPoint::new(time, dec!(42))).unwrap();

        assert_eq!(handler.charts()["Signals"].series("RSI").unwrap().values(), vec![dec!(42)]);
        assert_eq!(handler.take_chart_updates().len(), 1);
        assert!(handler.take_chart_updates().is_empty());
    }

    #[test]
    fn custom_emitter_bypasses_the_store() {
        let handler = builder().custom_emitter(Box::new(NullEmitter)).build().unwrap();
        let time = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        handler.sample(time, true).unwrap();

        assert!(handler.charts().is_empty());
        assert!(matches!(handler.generate_statistics(None), StatisticsOutcome::MissingData(_)));
    }

    #[test]
    fn exit_flag_is_shared() {
        let flag = ExitFlag::new();
        let handler = builder().exit_flag(flag.clone()).build().unwrap();

        flag.request();
        assert!(handler.exit_flag().is_requested());
    }

    #[test]
    fn handler_is_shareable_across_threads() {
        let handler = Arc::new(builder().build().unwrap());
        let sampler = Arc::clone(&handler);
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        let worker = std::thread::spawn(move || {
            for day in 0..30 {
                sampler.sample(start + chrono::Duration::days(day), false).unwrap();
            }
        });
        for _ in 0..30 {
            let _ = handler.generate_statistics(None);
        }
        worker.join().unwrap();

        let equity = handler.charts()[STRATEGY_EQUITY_CHART].series(EQUITY_SERIES).unwrap().len();
        assert_eq!(equity, 30);
    }

    #[test]
    fn start_time_seeds_the_sampling_state() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap();
        let handler = builder().start_time(start).build().unwrap();

        let state = handler.sampling_state();
        assert_eq!(state.previous_utc_sample_time, start);
        assert_eq!(state.daily_portfolio_value, dec!(5000));

        let later_that_day = Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap();
        assert_eq!(handler.sample(later_that_day, false).unwrap(), SampleDecision::Skipped);

        let next_day = Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap();
        handler.sample(next_day, false).unwrap();
        let equity = handler.charts()[STRATEGY_EQUITY_CHART].series(EQUITY_SERIES).unwrap().points().to_vec();
        assert_eq!(equity, vec![ChartPoint::new(later_that_day, dec!(5000))]);
    }

    #[test]
    fn closed_stream_is_reported_once_per_day() {
        let (sender, receiver) = mpsc::unbounded_channel();
        drop(receiver);
        let handler = builder().emitter(EmitterKind::Streaming(sender)).build().unwrap();

        let first = handler.sample(Utc.with_ymd_and_hms(2024, 1, 2, 1, 0, 0).unwrap(), false);
        assert!(matches!(first, Err(ResultsError::StreamClosed { .. })));

        for hour in 2..=5 {
            let time = Utc.with_ymd_and_hms(2024, 1, 2, hour, 0, 0).unwrap();
            assert_eq!(handler.sample(time, false).unwrap(), SampleDecision::Skipped);
        }
        assert_eq!(handler.chart_store().point_count(), 3);
    }
}
