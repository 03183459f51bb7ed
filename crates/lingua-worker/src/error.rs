//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Content generation or classification failed. Fatal to the job.
    #[error("Content generation failed: {0}")]
    ContentFailed(String),

    /// One artifact synthesis call failed. Attributed to that item only.
    #[error("Artifact synthesis failed: {0}")]
    SynthesisFailed(String),

    /// The render stage failed. Affects only the render sub-status.
    #[error("Render failed: {0}")]
    RenderFailed(String),

    /// The reconciled timeline violated the contiguity invariant.
    #[error("Timeline reconciliation failed: {0}")]
    Reconciliation(String),

    #[error("Capability endpoint returned {status}: {message}")]
    Endpoint { status: u16, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] lingua_storage::StorageError),

    #[error("Job store error: {0}")]
    Jobs(#[from] lingua_jobs::JobsError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn content_failed(msg: impl Into<String>) -> Self {
        Self::ContentFailed(msg.into())
    }

    pub fn synthesis_failed(msg: impl Into<String>) -> Self {
        Self::SynthesisFailed(msg.into())
    }

    pub fn render_failed(msg: impl Into<String>) -> Self {
        Self::RenderFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether this error ends the whole job (`status = failed`).
    ///
    /// Per-item synthesis failures and render failures are not fatal: the
    /// segment proceeds without the artifact, or the render sub-status
    /// carries the failure on its own axis.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            WorkerError::SynthesisFailed(_)
                | WorkerError::RenderFailed(_)
                | WorkerError::Endpoint { .. }
                | WorkerError::Http(_)
        )
    }

    /// Whether a retry of the same call might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Http(_) => true,
            WorkerError::Endpoint { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
