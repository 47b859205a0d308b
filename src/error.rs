use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("bus {line} unavailable: {reason}")]
    BusUnavailable { line: String, reason: String },

    #[error("bus i/o failure: {0}")]
    IoFailure(String),

    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("invalid frame: {0}")]
    ConversionInvalid(String),

    #[error("publish to {sink} failed: {reason}")]
    PublishFailure { sink: String, reason: String },

    #[error("missing configuration: {0}")]
    ConfigMissing(String),

    #[error("invalid configuration {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },
}

impl Error {
    /// Only startup faults end the process; everything else costs one cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::BusUnavailable { .. } | Error::ConfigMissing(_) | Error::ConfigInvalid { .. }
        )
    }

    pub(crate) fn publish(sink: &str, reason: impl ToString) -> Self {
        Error::PublishFailure {
            sink: sink.to_string(),
            reason: reason.to_string(),
        }
    }
}
