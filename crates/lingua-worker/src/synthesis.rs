//! Idempotent artifact generation.
//!
//! [`ArtifactGenerator::ensure`] wraps an external synthesis call with an
//! existence check: artifacts already on disk are never regenerated, which is
//! what makes a failed, partially-completed job safely resumable. Writes go
//! through the store's atomic path (temp sibling + rename), so a crash
//! mid-write never leaves a partial file the next existence check would
//! wrongly trust.
//!
//! The check-then-write sequence is guarded by a per-key async lock so two
//! concurrent generations for the same key cannot both pass the existence
//! check; keys embed the job id, which makes the exclusion job-scoped while
//! leaving independent per-segment generations free to run in parallel.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use lingua_storage::ArtifactStore;

use crate::error::WorkerResult;

/// Result of one `ensure` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureOutcome {
    /// Whether an existing artifact satisfied the call with no external work
    pub reused: bool,
    /// Store key of the artifact
    pub location: String,
}

/// Idempotent wrapper around external synthesis capabilities.
#[derive(Clone)]
pub struct ArtifactGenerator {
    store: ArtifactStore,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ArtifactGenerator {
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            store,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Produce the artifact at `key` unless it already exists.
    ///
    /// `produce` is invoked only on a miss; its failure is attributed to this
    /// one item and leaves nothing on disk.
    pub async fn ensure<F, Fut>(&self, key: &str, produce: F) -> WorkerResult<EnsureOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = WorkerResult<Vec<u8>>>,
    {
        let (outcome, _) = self
            .ensure_with(key, move || async move { Ok((produce().await?, ())) })
            .await?;
        Ok(outcome)
    }

    /// Like [`ensure`](Self::ensure), but `produce` also returns metadata
    /// about the fresh artifact (e.g. measured audio duration). On reuse the
    /// metadata is `None`; the caller falls back to its persisted record.
    pub async fn ensure_with<T, F, Fut>(
        &self,
        key: &str,
        produce: F,
    ) -> WorkerResult<(EnsureOutcome, Option<T>)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = WorkerResult<(Vec<u8>, T)>>,
    {
        if self.store.exists(key).await? {
            debug!(key = key, "artifact exists, skipping synthesis");
            return Ok((reused(key), None));
        }

        let lock = self.lock_for(key).await;
        let _guard = lock.lock().await;

        // Re-check under the lock: a concurrent caller may have produced the
        // artifact while we waited.
        if self.store.exists(key).await? {
            debug!(key = key, "artifact produced concurrently, skipping synthesis");
            return Ok((reused(key), None));
        }

        let (bytes, meta) = produce().await?;
        self.store.write_bytes(key, &bytes).await?;
        debug!(key = key, bytes = bytes.len(), "produced artifact");

        Ok((
            EnsureOutcome {
                reused: false,
                location: key.to_string(),
            },
            Some(meta),
        ))
    }

    async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn reused(key: &str) -> EnsureOutcome {
    EnsureOutcome {
        reused: true,
        location: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    use crate::error::WorkerError;

    fn generator() -> (TempDir, ArtifactGenerator) {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        (dir, ArtifactGenerator::new(store))
    }

    #[tokio::test]
    async fn test_first_call_produces_second_reuses() {
        let (_dir, generator) = generator();
        let calls = AtomicU32::new(0);

        let first = generator
            .ensure("job-1/audio/segment_1.mp3", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(b"audio".to_vec()) }
            })
            .await
            .unwrap();
        assert!(!first.reused);

        // Second call would fail if produce ran again.
        let second = generator
            .ensure("job-1/audio/segment_1.mp3", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(WorkerError::synthesis_failed("must not be called")) }
            })
            .await
            .unwrap();
        assert!(second.reused);
        assert_eq!(second.location, "job-1/audio/segment_1.mp3");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_produce_leaves_nothing_behind() {
        let (_dir, generator) = generator();

        let err = generator
            .ensure("job-1/images/segment_1.png", || async {
                Err(WorkerError::synthesis_failed("service down"))
            })
            .await
            .unwrap_err();
        assert!(!err.is_fatal());

        // The next attempt runs produce again and succeeds.
        let outcome = generator
            .ensure("job-1/images/segment_1.png", || async {
                Ok(b"png".to_vec())
            })
            .await
            .unwrap();
        assert!(!outcome.reused);
    }

    #[tokio::test]
    async fn test_ensure_with_returns_metadata_only_when_produced() {
        let (_dir, generator) = generator();

        let (outcome, meta) = generator
            .ensure_with("job-1/audio/segment_2.mp3", || async {
                Ok((b"audio".to_vec(), 3.5f64))
            })
            .await
            .unwrap();
        assert!(!outcome.reused);
        assert_eq!(meta, Some(3.5));

        let (outcome, meta) = generator
            .ensure_with("job-1/audio/segment_2.mp3", || async {
                Ok((b"other".to_vec(), 9.9f64))
            })
            .await
            .unwrap();
        assert!(outcome.reused);
        assert_eq!(meta, None);
    }

    #[tokio::test]
    async fn test_concurrent_ensures_produce_once() {
        let (_dir, generator) = generator();
        let calls = Arc::new(AtomicU32::new(0));

        let key = "job-1/audio/segment_3.mp3";
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let generator = generator.clone();
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    generator
                        .ensure(key, || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                            Ok(b"audio".to_vec())
                        })
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut produced = 0;
        for task in tasks {
            if !task.await.unwrap().reused {
                produced += 1;
            }
        }
        assert_eq!(produced, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_serialize() {
        let (_dir, generator) = generator();

        let a = generator.ensure("job-1/audio/segment_1.mp3", || async {
            Ok(b"a".to_vec())
        });
        let b = generator.ensure("job-1/audio/segment_2.mp3", || async {
            Ok(b"b".to_vec())
        });
        let (a, b) = tokio::join!(a, b);
        assert!(!a.unwrap().reused);
        assert!(!b.unwrap().reused);
    }
}
