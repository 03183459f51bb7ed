//! In-memory job store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use lingua_models::{JobId, JobStatus, OutputSegment, VideoJob};

use crate::error::{JobsError, JobsResult};
use crate::store::JobStore;

/// Process-local job store backed by a `HashMap`.
///
/// The compare-and-set runs under the map's write lock, which is what gives
/// the claim transition its atomicity in this single-process deployment.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<String, VideoJob>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get(&self, id: &JobId) -> JobsResult<VideoJob> {
        self.jobs
            .read()
            .await
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| JobsError::not_found(id.as_str()))
    }

    async fn insert(&self, job: VideoJob) -> JobsResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(job.id.as_str()) {
            return Err(JobsError::AlreadyExists(job.id.to_string()));
        }
        jobs.insert(job.id.to_string(), job);
        Ok(())
    }

    async fn save(&self, job: &VideoJob) -> JobsResult<()> {
        let mut jobs = self.jobs.write().await;
        if !jobs.contains_key(job.id.as_str()) {
            return Err(JobsError::not_found(job.id.as_str()));
        }
        jobs.insert(job.id.to_string(), job.clone());
        Ok(())
    }

    async fn compare_and_set_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        next: JobStatus,
    ) -> JobsResult<VideoJob> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id.as_str())
            .ok_or_else(|| JobsError::not_found(id.as_str()))?;

        if job.status != expected {
            return Err(JobsError::invalid_status_transition(job.status, next));
        }
        job.status = next;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn append_output_segment(
        &self,
        id: &JobId,
        segment: OutputSegment,
    ) -> JobsResult<VideoJob> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id.as_str())
            .ok_or_else(|| JobsError::not_found(id.as_str()))?;

        if job.status != JobStatus::Processing {
            return Err(JobsError::AppendRejected(job.status.as_str().to_string()));
        }
        job.push_output_segment(segment);
        Ok(job.clone())
    }

    async fn list_pending(&self) -> JobsResult<Vec<VideoJob>> {
        let jobs = self.jobs.read().await;
        let mut pending: Vec<VideoJob> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|j| j.created_at);
        Ok(pending)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingua_models::LessonPreferences;

    fn new_job() -> VideoJob {
        VideoJob::new("https://example.com/video", LessonPreferences::default())
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryJobStore::new();
        let job = new_job();
        let id = job.id.clone();

        store.insert(job).await.unwrap();
        let loaded = store.get(&id).await.unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let store = InMemoryJobStore::new();
        let job = new_job();
        store.insert(job.clone()).await.unwrap();
        assert!(matches!(
            store.insert(job).await,
            Err(JobsError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_get_missing_job() {
        let store = InMemoryJobStore::new();
        let err = store.get(&JobId::from_string("nope")).await.unwrap_err();
        assert!(matches!(err, JobsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cas_moves_status_once() {
        let store = InMemoryJobStore::new();
        let job = new_job();
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        let claimed = store
            .compare_and_set_status(&id, JobStatus::Pending, JobStatus::Processing)
            .await
            .unwrap();
        assert_eq!(claimed.status, JobStatus::Processing);

        let second = store
            .compare_and_set_status(&id, JobStatus::Pending, JobStatus::Processing)
            .await;
        assert!(second.unwrap_err().is_invalid_transition());
    }

    #[tokio::test]
    async fn test_concurrent_claims_one_winner() {
        let store = InMemoryJobStore::new();
        let job = new_job();
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        let (a, b) = tokio::join!(
            store.compare_and_set_status(&id, JobStatus::Pending, JobStatus::Processing),
            store.compare_and_set_status(&id, JobStatus::Pending, JobStatus::Processing),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    }

    #[tokio::test]
    async fn test_append_requires_processing() {
        let store = InMemoryJobStore::new();
        let job = new_job();
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        let segment = OutputSegment {
            id: 1,
            text: "hola".to_string(),
            audio_ref: "audio/segment_1.mp3".to_string(),
            duration_secs: 2.0,
        };

        // Pending: appends are rejected.
        assert!(matches!(
            store.append_output_segment(&id, segment.clone()).await,
            Err(JobsError::AppendRejected(_))
        ));

        store
            .compare_and_set_status(&id, JobStatus::Pending, JobStatus::Processing)
            .await
            .unwrap();
        let updated = store.append_output_segment(&id, segment).await.unwrap();
        assert_eq!(updated.output_segments.len(), 1);
    }

    #[tokio::test]
    async fn test_list_pending_oldest_first() {
        let store = InMemoryJobStore::new();
        let first = new_job();
        let second = new_job();
        let first_id = first.id.clone();
        store.insert(first).await.unwrap();
        store.insert(second).await.unwrap();

        // Claim nothing; both pending, creation order preserved.
        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first_id);

        store
            .compare_and_set_status(&first_id, JobStatus::Pending, JobStatus::Processing)
            .await
            .unwrap();
        assert_eq!(store.list_pending().await.unwrap().len(), 1);
    }
}
