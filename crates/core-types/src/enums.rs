use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side of the order
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// How a series is meant to be drawn. The sampler only tags series with it;
/// rendering is left to whoever consumes the charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeriesType {
    Line,
    Scatter,
    Candle,
    Bar,
    Flag,
    StackedArea,
    Pie,
    Treemap,
}

impl fmt::Display for SeriesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeriesType::Line => "line",
            SeriesType::Scatter => "scatter",
            SeriesType::Candle => "candle",
            SeriesType::Bar => "bar",
            SeriesType::Flag => "flag",
            SeriesType::StackedArea => "stacked-area",
            SeriesType::Pie => "pie",
            SeriesType::Treemap => "treemap",
        };
        f.write_str(name)
    }
}
