//! Job lifecycle state machine.
//!
//! Owns both status axes of a job: the overall `status` and the render-stage
//! `video_generation_status`. Every mutation is validated against the
//! transition rules before it is persisted, so an illegal move surfaces as an
//! [`JobsError::InvalidTransition`] instead of silently overwriting a
//! terminal record.

use std::sync::Arc;

use metrics::counter;
use tracing::{info, warn};

use lingua_models::{JobId, JobStatus, VideoGenerationStatus, VideoJob};

use crate::error::{JobsError, JobsResult};
use crate::store::JobStore;

/// Validates and persists job status transitions.
#[derive(Clone)]
pub struct JobStateMachine {
    store: Arc<dyn JobStore>,
}

impl JobStateMachine {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Claim a pending job for processing.
    ///
    /// Runs as a compare-and-set in the store: if two workers race the same
    /// job, exactly one claim succeeds and the loser sees a rejected
    /// transition.
    pub async fn claim(&self, id: &JobId) -> JobsResult<VideoJob> {
        let job = self
            .store
            .compare_and_set_status(id, JobStatus::Pending, JobStatus::Processing)
            .await?;
        counter!("lingua_job_transitions_total", "axis" => "status", "to" => "processing")
            .increment(1);
        info!(job_id = %id, "claimed job for processing");
        Ok(job)
    }

    /// Mark a processing job as completed.
    pub async fn complete(&self, id: &JobId) -> JobsResult<VideoJob> {
        let job = self.checked_status(id, JobStatus::Completed).await?;
        let job = job.complete();
        self.store.save(&job).await?;
        counter!("lingua_job_transitions_total", "axis" => "status", "to" => "completed")
            .increment(1);
        info!(job_id = %id, "job completed");
        Ok(job)
    }

    /// Mark a processing job as failed with a human-readable cause.
    pub async fn fail(&self, id: &JobId, error: &str) -> JobsResult<VideoJob> {
        let job = self.checked_status(id, JobStatus::Failed).await?;
        let job = job.fail(error);
        self.store.save(&job).await?;
        counter!("lingua_job_transitions_total", "axis" => "status", "to" => "failed")
            .increment(1);
        warn!(job_id = %id, error = error, "job failed");
        Ok(job)
    }

    /// Start (or retry) the render stage.
    pub async fn begin_render(&self, id: &JobId) -> JobsResult<VideoJob> {
        let job = self
            .checked_render(id, VideoGenerationStatus::Generating)
            .await?;
        let job = job.begin_render();
        self.store.save(&job).await?;
        counter!("lingua_job_transitions_total", "axis" => "render", "to" => "generating")
            .increment(1);
        info!(job_id = %id, "render started");
        Ok(job)
    }

    /// Mark the render stage as completed.
    pub async fn complete_render(&self, id: &JobId) -> JobsResult<VideoJob> {
        let job = self
            .checked_render(id, VideoGenerationStatus::Completed)
            .await?;
        let job = job.complete_render();
        self.store.save(&job).await?;
        counter!("lingua_job_transitions_total", "axis" => "render", "to" => "completed")
            .increment(1);
        info!(job_id = %id, "render completed");
        Ok(job)
    }

    /// Mark the render stage as failed. The overall `status` is untouched.
    pub async fn fail_render(&self, id: &JobId, error: &str) -> JobsResult<VideoJob> {
        let job = self
            .checked_render(id, VideoGenerationStatus::Failed)
            .await?;
        let job = job.fail_render(error);
        self.store.save(&job).await?;
        counter!("lingua_job_transitions_total", "axis" => "render", "to" => "failed")
            .increment(1);
        warn!(job_id = %id, error = error, "render failed");
        Ok(job)
    }

    async fn checked_status(&self, id: &JobId, next: JobStatus) -> JobsResult<VideoJob> {
        let job = self.store.get(id).await?;
        if !job.status.can_transition_to(next) {
            return Err(JobsError::invalid_status_transition(job.status, next));
        }
        Ok(job)
    }

    async fn checked_render(
        &self,
        id: &JobId,
        next: VideoGenerationStatus,
    ) -> JobsResult<VideoJob> {
        let job = self.store.get(id).await?;
        if !job.video_generation_status.can_transition_to(next) {
            return Err(JobsError::invalid_render_transition(
                job.video_generation_status,
                next,
            ));
        }
        Ok(job)
    }
}
