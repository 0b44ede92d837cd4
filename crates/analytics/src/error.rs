use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Not enough data to perform calculation: {0}")]
    NotEnoughData(String),

    #[error("Calculation error in metric '{metric}': {reason}")]
    Calculation { metric: String, reason: String },
}

impl AnalyticsError {
    pub(crate) fn calculation(metric: &str, reason: impl Into<String>) -> Self {
        Self::Calculation {
            metric: metric.to_string(),
            reason: reason.into(),
        }
    }
}
