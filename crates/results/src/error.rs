use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResultsError {
    /// The points were stored but could not be delivered to the live listener.
    #[error("The result stream is closed; point for '{chart}/{series}' was stored but not sent")]
    StreamClosed { chart: String, series: String },

    /// The emitter rejected the points; nothing was recorded.
    #[error("The sample emitter failed: {0}")]
    EmitterFailed(String),

    #[error("Results handler is missing its {0}")]
    MissingCollaborator(&'static str),
}

impl ResultsError {
    /// Whether the points of the failed emission already reached the chart store.
    pub fn points_recorded(&self) -> bool {
        matches!(self, ResultsError::StreamClosed { .. })
    }
}
