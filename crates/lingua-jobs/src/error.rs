//! Job store and state machine error types.

use lingua_models::{JobStatus, VideoGenerationStatus};
use thiserror::Error;

/// Result type for job store operations.
pub type JobsResult<T> = Result<T, JobsError>;

/// Errors from the job store or the lifecycle state machine.
#[derive(Debug, Error)]
pub enum JobsError {
    #[error("Invalid {axis} transition: {from} -> {to}")]
    InvalidTransition {
        axis: &'static str,
        from: String,
        to: String,
    },

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    AlreadyExists(String),

    #[error("Cannot append output segment while job is {0}")]
    AppendRejected(String),
}

impl JobsError {
    pub fn invalid_status_transition(from: JobStatus, to: JobStatus) -> Self {
        Self::InvalidTransition {
            axis: "status",
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        }
    }

    pub fn invalid_render_transition(from: VideoGenerationStatus, to: VideoGenerationStatus) -> Self {
        Self::InvalidTransition {
            axis: "video_generation_status",
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Whether this is a rejected state transition (e.g. a lost claim race).
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}
