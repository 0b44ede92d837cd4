use crate::chart::{
    BENCHMARK_CHART, BENCHMARK_SERIES, DAILY_PERFORMANCE_SERIES, EQUITY_SERIES, STRATEGY_EQUITY_CHART,
    Sample, SampleTarget,
};
use crate::collaborators::{Benchmark, PortfolioValuation};
use crate::emitter::SampleEmitter;
use crate::error::ResultsError;
use crate::rounding::smart_round;
use chrono::{DateTime, Utc};
use core_types::{ChartPoint, SeriesType};
use rust_decimal::Decimal;

/// Decimal places kept on the daily performance percentage.
const DAILY_PERFORMANCE_DP: u32 = 10;

/// What the sampler remembers between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingState {
    /// The time passed to the previous `sample` call.
    pub previous_utc_sample_time: DateTime<Utc>,
    /// Portfolio value at the last day close; the basis of daily performance.
    pub daily_portfolio_value: Decimal,
}

impl Default for SamplingState {
    fn default() -> Self {
        Self {
            previous_utc_sample_time: DateTime::<Utc>::UNIX_EPOCH,
            daily_portfolio_value: Decimal::ZERO,
        }
    }
}

/// The outcome of one `sample` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDecision {
    /// Same UTC day and not forced; nothing was emitted.
    Skipped,
    Sampled {
        day_changed: bool,
        daily_performance: Decimal,
    },
}

/// Decides on every tick whether the equity, benchmark and daily performance
/// curves get a new point.
///
/// Organic samples happen once per UTC day, on the first tick of a new day,
/// and are stamped with the last time seen on the previous day: they record
/// that day's close. Forced samples happen whenever asked and are stamped with
/// the requested time; they never move the daily performance baseline.
///
/// Calls must come with non-decreasing times.
#[derive(Debug, Default)]
pub struct Sampler {
    state: SamplingState,
}

impl Sampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: SamplingState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> SamplingState {
        self.state
    }

    /// Runs one sampling decision at `time`.
    ///
    /// If the emitter fails before recording anything, the error is returned
    /// and the state is left as it was, so the next tick retries the same
    /// sample. A failure after the points were recorded (a closed stream) is
    /// returned too, but the state moves on so the points are not stored twice.
    pub fn sample(
        &mut self,
        time: DateTime<Utc>,
        force: bool,
        portfolio: &dyn PortfolioValuation,
        benchmark: &dyn Benchmark,
        emitter: &dyn SampleEmitter,
    ) -> Result<SampleDecision, ResultsError> {
        let previous = self.state.previous_utc_sample_time;
        if time < previous {
            tracing::debug!(%time, %previous, "Sample time moved backwards");
        }

        let day_changed = previous.date_naive() != time.date_naive();
        if !day_changed && !force {
            self.state.previous_utc_sample_time = time;
            return Ok(SampleDecision::Skipped);
        }

        let sample_time = if force { time } else { previous };
        let current_value = portfolio.total_portfolio_value();
        let daily_performance = daily_performance(current_value, self.state.daily_portfolio_value);
        let benchmark_value = smart_round(benchmark.evaluate(sample_time));

        let emitted = emitter.emit_batch(&[
            Sample {
                target: SampleTarget::new(STRATEGY_EQUITY_CHART, EQUITY_SERIES, 0, SeriesType::Candle),
                point: ChartPoint::new(sample_time, current_value),
            },
            Sample {
                target: SampleTarget::new(BENCHMARK_CHART, BENCHMARK_SERIES, 0, SeriesType::Line),
                point: ChartPoint::new(sample_time, benchmark_value),
            },
            Sample {
                target: SampleTarget::new(STRATEGY_EQUITY_CHART, DAILY_PERFORMANCE_SERIES, 1, SeriesType::Bar)
                    .with_unit("%"),
                point: ChartPoint::new(sample_time, daily_performance),
            },
        ]);
        if let Err(e) = emitted {
            if e.points_recorded() {
                self.commit(time, day_changed, current_value);
            }
            return Err(e);
        }

        tracing::debug!(
            %sample_time,
            equity = %current_value,
            benchmark = %benchmark_value,
            performance = %daily_performance,
            day_changed,
            force,
            "Sampled"
        );

        self.commit(time, day_changed, current_value);

        Ok(SampleDecision::Sampled { day_changed, daily_performance })
    }

    fn commit(&mut self, time: DateTime<Utc>, day_changed: bool, current_value: Decimal) {
        if day_changed {
            self.state.daily_portfolio_value = current_value;
        }
        self.state.previous_utc_sample_time = time;
    }
}

/// Percentage change from the last day-close value, rounded to ten decimal
/// places. Zero when there is no baseline yet.
pub fn daily_performance(current_value: Decimal, daily_portfolio_value: Decimal) -> Decimal {
    if daily_portfolio_value.is_zero() {
        return Decimal::ZERO;
    }
    ((current_value - daily_portfolio_value) * Decimal::ONE_HUNDRED / daily_portfolio_value)
        .round_dp(DAILY_PERFORMANCE_DP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartStore;
    use crate::collaborators::ConstantBenchmark;
    use crate::emitter::{BufferedEmitter, NullEmitter, StreamingEmitter};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::sync::Mutex;

    /// A portfolio whose value the test sets directly.
    #[derive(Default)]
    struct Valuation(Mutex<Decimal>);

    impl Valuation {
        fn set(&self, value: Decimal) {
            *self.0.lock().unwrap() = value;
        }
    }

    impl PortfolioValuation for Valuation {
        fn total_portfolio_value(&self) -> Decimal {
            *self.0.lock().unwrap()
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

    struct FailingEmitter;

    impl SampleEmitter for FailingEmitter {
        fn emit(&self, target: &SampleTarget<'_>, _point: ChartPoint) -> Result<(), ResultsError> {
            Err(ResultsError::EmitterFailed(format!("{} is read-only", target.chart)))
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn daily_performance_guards_a_zero_baseline() {
        assert_eq!(daily_performance(dec!(101000), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(daily_performance(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn daily_performance_is_rounded_to_ten_places() {
        assert_eq!(daily_performance(dec!(102010), dec!(101000)), dec!(1));
        assert_eq!(daily_performance(dec!(100), dec!(3)), dec!(3233.3333333333));
        assert_eq!(daily_performance(dec!(99), dec!(100)), dec!(-1));
    }

    #[test]
    fn first_call_samples_at_the_epoch_when_the_day_changes() {
        let portfolio = Valuation::default();
        portfolio.set(dec!(100000));
        let store = Arc::new(ChartStore::new());
        let emitter = BufferedEmitter::new(Arc::clone(&store));
        let mut sampler = Sampler::new();

        let decision = sampler
            .sample(at(2, 10), false, &portfolio, &ConstantBenchmark(dec!(50)), &emitter)
            .unwrap();

        assert_eq!(
            decision,
            SampleDecision::Sampled { day_changed: true, daily_performance: Decimal::ZERO }
        );
        let equity = store.series_points(STRATEGY_EQUITY_CHART, EQUITY_SERIES).unwrap();
        assert_eq!(equity[0].time, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(sampler.state().daily_portfolio_value, dec!(100000));
        assert_eq!(sampler.state().previous_utc_sample_time, at(2, 10));
    }

    #[test]
    fn same_day_ticks_are_no_ops() {
        let portfolio = Valuation::default();
        portfolio.set(dec!(100));
        let store = Arc::new(ChartStore::new());
        let emitter = BufferedEmitter::new(Arc::clone(&store));
        let benchmark = ConstantBenchmark(dec!(1));
        let mut sampler = Sampler::new();

        sampler.sample(at(2, 1), false, &portfolio, &benchmark, &emitter).unwrap();
        let after_first = store.point_count();

        for hour in 2..23 {
            portfolio.set(Decimal::from(hour));
            let decision = sampler.sample(at(2, hour), false, &portfolio, &benchmark, &emitter).unwrap();
            assert_eq!(decision, SampleDecision::Skipped);
        }

        assert_eq!(store.point_count(), after_first);
        assert_eq!(sampler.state().previous_utc_sample_time, at(2, 22));
    }

    #[test]
    fn organic_sample_is_stamped_with_the_previous_days_last_tick() {
        let portfolio = Valuation::default();
        let store = Arc::new(ChartStore::new());
        let emitter = BufferedEmitter::new(Arc::clone(&store));
        let benchmark = ConstantBenchmark(dec!(1));
        let mut sampler = Sampler::with_state(SamplingState {
            previous_utc_sample_time: at(2, 0),
            daily_portfolio_value: dec!(100),
        });

        portfolio.set(dec!(105));
        sampler.sample(at(2, 23), false, &portfolio, &benchmark, &emitter).unwrap();
        sampler.sample(at(3, 9), false, &portfolio, &benchmark, &emitter).unwrap();

        let perf = store.series_points(STRATEGY_EQUITY_CHART, DAILY_PERFORMANCE_SERIES).unwrap();
        assert_eq!(perf, vec![ChartPoint::new(at(2, 23), dec!(5))]);
        assert_eq!(sampler.state().daily_portfolio_value, dec!(105));
    }

    #[test]
    fn forced_samples_reemit_and_keep_the_baseline() {
        let portfolio = Valuation::default();
        portfolio.set(dec!(110));
        let store = Arc::new(ChartStore::new());
        let emitter = BufferedEmitter::new(Arc::clone(&store));
        let benchmark = ConstantBenchmark(dec!(1));
        let mut sampler = Sampler::with_state(SamplingState {
            previous_utc_sample_time: at(5, 9),
            daily_portfolio_value: dec!(100),
        });

        for _ in 0..3 {
            let decision = sampler.sample(at(5, 12), true, &portfolio, &benchmark, &emitter).unwrap();
            assert_eq!(
                decision,
                SampleDecision::Sampled { day_changed: false, daily_performance: dec!(10) }
            );
        }

        let equity = store.series_points(STRATEGY_EQUITY_CHART, EQUITY_SERIES).unwrap();
        assert_eq!(equity.len(), 3);
        assert!(equity.iter().all(|p| p.time == at(5, 12)));
        assert_eq!(sampler.state().daily_portfolio_value, dec!(100));
    }

    #[test]
    fn benchmark_is_evaluated_at_the_sample_time_and_smart_rounded() {
        let portfolio = Valuation::default();
        let store = Arc::new(ChartStore::new());
        let emitter = BufferedEmitter::new(Arc::clone(&store));
        let mut sampler = Sampler::new();

        sampler
            .sample(at(4, 8), true, &portfolio, &ConstantBenchmark(dec!(4521.3389)), &emitter)
            .unwrap();

        let benchmark = store.series_points(BENCHMARK_CHART, BENCHMARK_SERIES).unwrap();
        assert_eq!(benchmark, vec![ChartPoint::new(at(4, 8), dec!(4521.34))]);
    }

    #[test]
    fn failed_emission_leaves_state_untouched() {
        let portfolio = Valuation::default();
        portfolio.set(dec!(100));
        let initial = SamplingState {
            previous_utc_sample_time: at(1, 20),
            daily_portfolio_value: dec!(90),
        };
        let mut sampler = Sampler::with_state(initial);

        let result = sampler.sample(at(2, 1), false, &portfolio, &ConstantBenchmark(dec!(1)), &FailingEmitter);
        assert!(result.is_err());
        assert_eq!(sampler.state(), initial);

        let decision = sampler
            .sample(at(2, 2), false, &portfolio, &ConstantBenchmark(dec!(1)), &NullEmitter)
            .unwrap();
        assert!(matches!(decision, SampleDecision::Sampled { day_changed: true, .. }));
    }

    #[test]
    fn closed_stream_does_not_duplicate_stored_points() {
        let portfolio = Valuation::default();
        portfolio.set(dec!(100));
        let store = Arc::new(ChartStore::new());
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        drop(receiver);
        let emitter = StreamingEmitter::new(Arc::clone(&store), sender);
        let benchmark = ConstantBenchmark(dec!(1));
        let mut sampler = Sampler::with_state(SamplingState {
            previous_utc_sample_time: at(1, 20),
            daily_portfolio_value: dec!(90),
        });

        let err = sampler.sample(at(2, 1), false, &portfolio, &benchmark, &emitter).unwrap_err();
        assert!(err.points_recorded());
        assert_eq!(store.point_count(), 3);
        assert_eq!(sampler.state().daily_portfolio_value, dec!(100));

        for hour in 2..6 {
            let decision = sampler.sample(at(2, hour), false, &portfolio, &benchmark, &emitter).unwrap();
            assert_eq!(decision, SampleDecision::Skipped);
        }
        assert_eq!(store.point_count(), 3);
        assert_eq!(sampler.state().previous_utc_sample_time, at(2, 5));
    }
}
