use crate::chart::{ChartStore, Sample, SampleTarget};
use crate::error::ResultsError;
use core_types::ChartPoint;
use events::{ChartUpdate, ResultMessage};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Receives every point the sampler (or the algorithm) records.
///
/// The sampler only ever talks to this trait, so what happens to a point
/// (buffered for a final report, pushed to a live listener, dropped) is decided
/// by whichever implementation the handler was built with.
pub trait SampleEmitter: Send + Sync {
    fn emit(&self, target: &SampleTarget<'_>, point: ChartPoint) -> Result<(), ResultsError>;

    /// Emits points that belong together. Implementations that buffer should
    /// override this to make the whole batch visible at once.
    fn emit_batch(&self, samples: &[Sample<'_>]) -> Result<(), ResultsError> {
        for sample in samples {
            self.emit(&sample.target, sample.point)?;
        }
        Ok(())
    }
}

/// Keeps every point in the shared chart store for later packaging.
/// This is the backtest emitter.
#[derive(Debug, Clone)]
pub struct BufferedEmitter {
    store: Arc<ChartStore>,
}

impl BufferedEmitter {
    pub fn new(store: Arc<ChartStore>) -> Self {
        Self { store }
    }
}

impl SampleEmitter for BufferedEmitter {
    fn emit(&self, target: &SampleTarget<'_>, point: ChartPoint) -> Result<(), ResultsError> {
        self.store.append(target, point);
        Ok(())
    }

    fn emit_batch(&self, samples: &[Sample<'_>]) -> Result<(), ResultsError> {
        self.store.append_batch(samples);
        Ok(())
    }
}

/// Records into the chart store and immediately pushes each point to a live
/// listener as a `ResultMessage::ChartUpdate`.
///
/// Points are stored before they are sent, so a closed stream still leaves the
/// store complete for the final statistics.
#[derive(Debug, Clone)]
pub struct StreamingEmitter {
    store: Arc<ChartStore>,
    sender: UnboundedSender<ResultMessage>,
}

impl StreamingEmitter {
    pub fn new(store: Arc<ChartStore>, sender: UnboundedSender<ResultMessage>) -> Self {
        Self { store, sender }
    }

    fn send(&self, target: &SampleTarget<'_>, point: ChartPoint) -> Result<(), ResultsError> {
        let update = ChartUpdate {
            chart: target.chart.to_string(),
            series: target.series.to_string(),
            index: target.index,
            series_type: target.series_type,
            unit: target.unit.to_string(),
            point,
        };
        self.sender
            .send(ResultMessage::ChartUpdate(update))
            .map_err(|_| ResultsError::StreamClosed {
                chart: target.chart.to_string(),
                series: target.series.to_string(),
            })
    }
}

impl SampleEmitter for StreamingEmitter {
    fn emit(&self, target: &SampleTarget<'_>, point: ChartPoint) -> Result<(), ResultsError> {
        self.store.append(target, point);
        self.send(target, point)
    }

    fn emit_batch(&self, samples: &[Sample<'_>]) -> Result<(), ResultsError> {
        self.store.append_batch(samples);
        for sample in samples {
            self.send(&sample.target, sample.point)?;
        }
        Ok(())
    }
}

/// Drops every point.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEmitter;

impl SampleEmitter for NullEmitter {
    fn emit(&self, _target: &SampleTarget<'_>, _point: ChartPoint) -> Result<(), ResultsError> {
        Ok(())
    }
}

/// The built-in emitters, picked when the results handler is built.
#[derive(Debug, Clone, Default)]
pub enum EmitterKind {
    #[default]
    Buffered,
    Streaming(UnboundedSender<ResultMessage>),
    Null,
}

impl EmitterKind {
    pub fn into_emitter(self, store: Arc<ChartStore>) -> Box<dyn SampleEmitter> {
        match self {
            EmitterKind::Buffered => Box::new(BufferedEmitter::new(store)),
            EmitterKind::Streaming(sender) => Box::new(StreamingEmitter::new(store, sender)),
            EmitterKind::Null => Box::new(NullEmitter),
        }
    }
}
