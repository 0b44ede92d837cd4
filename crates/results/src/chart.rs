use core_types::{ChartPoint, SeriesType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Chart holding the equity and daily performance series.
pub const STRATEGY_EQUITY_CHART: &str = "Strategy Equity";
pub const EQUITY_SERIES: &str = "Equity";
pub const DAILY_PERFORMANCE_SERIES: &str = "Daily Performance";
/// The benchmark chart and its single series share a name.
pub const BENCHMARK_CHART: &str = "Benchmark";
pub const BENCHMARK_SERIES: &str = "Benchmark";

/// A consistent copy of every chart, taken under the store lock.
pub type ChartSnapshot = BTreeMap<String, Chart>;

/// Where a point goes and how its series is described if it has to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleTarget<'a> {
    pub chart: &'a str,
    pub series: &'a str,
    pub index: usize,
    pub series_type: SeriesType,
    pub unit: &'a str,
}

impl<'a> SampleTarget<'a> {
    /// A target with the default `$` unit.
    pub fn new(chart: &'a str, series: &'a str, index: usize, series_type: SeriesType) -> Self {
        Self { chart, series, index, series_type, unit: "$" }
    }

    pub fn with_unit(mut self, unit: &'a str) -> Self {
        self.unit = unit;
        self
    }
}

/// A point together with its destination, for batched emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample<'a> {
    pub target: SampleTarget<'a>,
    pub point: ChartPoint,
}

/// An ordered run of points. Arrival order is the timeline: points are never
/// reordered and several points may share a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub series_type: SeriesType,
    pub unit: String,
    pub index: usize,
    points: Vec<ChartPoint>,
    #[serde(skip)]
    update_position: usize,
}

impl Series {
    pub fn new(name: impl Into<String>, series_type: SeriesType, index: usize, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            series_type,
            unit: unit.into(),
            index,
            points: Vec::new(),
            update_position: 0,
        }
    }

    pub fn add_point(&mut self, point: ChartPoint) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[ChartPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<Decimal> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns a copy holding only the points added since the previous call
    /// and advances the update cursor.
    fn take_updates(&mut self) -> Series {
        let mut updates = Series::new(self.name.clone(), self.series_type, self.index, self.unit.clone());
        updates.points = self.points[self.update_position..].to_vec();
        self.update_position = self.points.len();
        updates
    }
}

/// A named group of series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub name: String,
    pub series: BTreeMap<String, Series>,
}

impl Chart {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            series: BTreeMap::new(),
        }
    }

    pub fn series(&self, name: &str) -> Option<&Series> {
        self.series.get(name)
    }

    /// Appends a point, creating the series from `target` on first use.
    /// An existing series keeps the description it was created with.
    pub fn add_sample(&mut self, target: &SampleTarget<'_>, point: ChartPoint) {
        self.series
            .entry(target.series.to_string())
            .or_insert_with(|| Series::new(target.series, target.series_type, target.index, target.unit))
            .add_point(point);
    }

    fn take_updates(&mut self) -> Option<Chart> {
        let mut updates = Chart::new(self.name.clone());
        for (name, series) in &mut self.series {
            let delta = series.take_updates();
            if !delta.is_empty() {
                updates.series.insert(name.clone(), delta);
            }
        }
        (!updates.series.is_empty()).then_some(updates)
    }
}

/// The shared chart collection.
///
/// Every access goes through one mutex. A whole batch of points is appended
/// under a single acquisition, and readers copy what they need while holding
/// it, so nobody ever sees half of a batch.
#[derive(Debug, Default)]
pub struct ChartStore {
    charts: Mutex<ChartSnapshot>,
}

impl ChartStore {
    pub fn new() -> Self {
        Self::default()
    }

    // The map is only ever mutated by single, non-panicking statements, so a
    // poisoned lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, ChartSnapshot> {
        self.charts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends one point, creating the chart and series if absent.
    pub fn append(&self, target: &SampleTarget<'_>, point: ChartPoint) {
        let mut charts = self.lock();
        append_locked(&mut charts, target, point);
    }

    /// Appends several points under one lock acquisition.
    pub fn append_batch(&self, samples: &[Sample<'_>]) {
        let mut charts = self.lock();
        for sample in samples {
            append_locked(&mut charts, &sample.target, sample.point);
        }
    }

    /// A full copy of every chart.
    pub fn snapshot(&self) -> ChartSnapshot {
        self.lock().clone()
    }

    pub fn series_points(&self, chart: &str, series: &str) -> Option<Vec<ChartPoint>> {
        self.lock()
            .get(chart)
            .and_then(|c| c.series(series))
            .map(|s| s.points().to_vec())
    }

    /// Total number of points across every series.
    pub fn point_count(&self) -> usize {
        self.lock()
            .values()
            .flat_map(|c| c.series.values())
            .map(Series::len)
            .sum()
    }

    /// Charts containing only the points appended since the previous call.
    /// Charts with nothing new are left out.
    pub fn take_updates(&self) -> Vec<Chart> {
        self.lock().values_mut().filter_map(Chart::take_updates).collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

fn append_locked(charts: &mut ChartSnapshot, target: &SampleTarget<'_>, point: ChartPoint) {
    charts
        .entry(target.chart.to_string())
        .or_insert_with(|| Chart::new(target.chart))
        .add_sample(target, point);
}
