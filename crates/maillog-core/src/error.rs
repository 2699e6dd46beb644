use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorrelateError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("log source unavailable: {path}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },
    #[error("correlation worker failed: {0}")]
    Worker(String),
}

impl CorrelateError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub fn unavailable(
        path: impl Into<PathBuf>,
        reason: impl ToString
    ) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            reason: reason.to_string()
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            Self::SourceUnavailable { .. } => "SOURCE_UNAVAILABLE",
            Self::Worker(_) => "WORKER_FAILED"
        }
    }
}
