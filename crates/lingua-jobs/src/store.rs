//! Job record store contract.
//!
//! The pipeline consumes job persistence only through this narrow interface.
//! Everything behind it (an ORM, a document database, the in-memory map used
//! by the worker and tests) is interchangeable as long as
//! [`JobStore::compare_and_set_status`] is genuinely atomic.

use async_trait::async_trait;

use lingua_models::{JobId, JobStatus, OutputSegment, VideoJob};

use crate::error::JobsResult;

/// Narrow read/write contract for persisted job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch a job by id.
    async fn get(&self, id: &JobId) -> JobsResult<VideoJob>;

    /// Insert a new job record. Fails if the id already exists.
    async fn insert(&self, job: VideoJob) -> JobsResult<()>;

    /// Overwrite an existing job record.
    async fn save(&self, job: &VideoJob) -> JobsResult<()>;

    /// Atomically move the job's `status` from `expected` to `next`, stamping
    /// `updated_at`, and return the updated record.
    ///
    /// The check and the write happen under one lock/transaction: two callers
    /// racing the same transition see exactly one success and one
    /// `InvalidTransition`. This is what makes `pending -> processing` a safe
    /// claim.
    async fn compare_and_set_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        next: JobStatus,
    ) -> JobsResult<VideoJob>;

    /// Record one produced segment artifact on the job.
    ///
    /// Output segments are append-only while the job is processing and frozen
    /// afterwards; appends in any other status are rejected.
    async fn append_output_segment(
        &self,
        id: &JobId,
        segment: OutputSegment,
    ) -> JobsResult<VideoJob>;

    /// All jobs currently pending, oldest first.
    async fn list_pending(&self) -> JobsResult<Vec<VideoJob>>;

    /// Store name for logging.
    fn name(&self) -> &'static str;
}
