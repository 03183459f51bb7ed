//! Filesystem artifact store.
//!
//! Every job owns a working directory under the store root holding its
//! intermediate artifacts: the audio-segments manifest, the image manifest,
//! the synchronized timeline, per-segment media files, and the final render.
//! All writes are atomic (unique temp sibling, then rename) so a crash
//! mid-write can never leave a partial file that a later existence check
//! would treat as a valid artifact.

use std::path::{Component, Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Configuration for the artifact store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory holding one subdirectory per job
    pub root: PathBuf,
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let root = std::env::var("LINGUA_ARTIFACT_ROOT")
            .map_err(|_| StorageError::config_error("LINGUA_ARTIFACT_ROOT not set"))?;
        if root.trim().is_empty() {
            return Err(StorageError::config_error("LINGUA_ARTIFACT_ROOT is empty"));
        }
        Ok(Self {
            root: PathBuf::from(root),
        })
    }
}

/// Filesystem-backed artifact store.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let config = StoreConfig::from_env()?;
        Ok(Self::new(config.root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working directory for one job.
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    /// Resolve a store key to an absolute path, rejecting traversal.
    pub fn resolve(&self, key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(key);
        if key.is_empty() || relative.is_absolute() {
            return Err(StorageError::invalid_key(key));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(StorageError::invalid_key(key)),
            }
        }
        Ok(self.root.join(relative))
    }

    /// Whether a non-empty artifact exists at the key.
    ///
    /// Zero-byte files do not count: an interrupted legacy write or a
    /// `touch`ed placeholder must not satisfy the idempotency check.
    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.resolve(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file() && meta.len() > 0),
            Err(_) => Ok(false),
        }
    }

    /// Atomically write bytes to the key. Returns the final path.
    pub async fn write_bytes(&self, key: &str, bytes: &[u8]) -> StorageResult<PathBuf> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Unique sibling in the same directory so the rename stays on one
        // filesystem and is atomic.
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StorageError::write_failed(format!(
                "rename {} -> {}: {}",
                tmp.display(),
                path.display(),
                e
            )));
        }

        debug!(key = key, bytes = bytes.len(), "wrote artifact");
        Ok(path)
    }

    /// Read the full contents at the key.
    pub async fn read_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(key))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically write a value as pretty-printed JSON.
    pub async fn write_json<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<PathBuf> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read and deserialize a JSON artifact.
    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<T> {
        let bytes = self.read_bytes(key).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Delete the artifact at the key, if present.
    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove orphaned `*.tmp` files a crash may have left in the job's
    /// directory tree. Returns the number of files removed.
    pub async fn sweep_temp_files(&self, job_id: &str) -> StorageResult<usize> {
        let mut removed = 0;
        let mut dirs = vec![self.job_dir(job_id)];
        while let Some(dir) = dirs.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.is_dir() {
                    dirs.push(path);
                } else if path.extension().map(|e| e == "tmp").unwrap_or(false) {
                    match fs::remove_file(&path).await {
                        Ok(()) => removed += 1,
                        Err(e) => warn!(path = %path.display(), error = %e, "failed to sweep temp file"),
                    }
                }
            }
        }
        if removed > 0 {
            debug!(job_id = job_id, removed = removed, "swept orphaned temp files");
        }
        Ok(removed)
    }

    // ========================================================================
    // Key helpers — the per-job artifact layout
    // ========================================================================

    pub fn lesson_key(job_id: &str) -> String {
        format!("{}/lesson.json", job_id)
    }

    pub fn audio_manifest_key(job_id: &str) -> String {
        format!("{}/audio_segments.json", job_id)
    }

    pub fn image_manifest_key(job_id: &str) -> String {
        format!("{}/images.json", job_id)
    }

    pub fn timeline_key(job_id: &str) -> String {
        format!("{}/timeline.json", job_id)
    }

    pub fn segment_audio_key(job_id: &str, segment_id: u32) -> String {
        format!("{}/audio/segment_{}.mp3", job_id, segment_id)
    }

    pub fn segment_image_key(job_id: &str, segment_id: u32) -> String {
        format!("{}/images/segment_{}.png", job_id, segment_id)
    }

    pub fn render_output_key(job_id: &str) -> String {
        format!("{}/render/lesson.mp4", job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let (_dir, store) = store();
        let key = ArtifactStore::segment_audio_key("job-1", 3);

        let path = store.write_bytes(&key, b"audio bytes").await.unwrap();
        assert!(path.ends_with("job-1/audio/segment_3.mp3"));
        assert_eq!(store.read_bytes(&key).await.unwrap(), b"audio bytes");
        assert!(store.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let (dir, store) = store();
        let key = ArtifactStore::timeline_key("job-1");
        store.write_bytes(&key, b"{}").await.unwrap();

        let job_dir = dir.path().join("job-1");
        let names: Vec<String> = std::fs::read_dir(&job_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["timeline.json".to_string()]);
    }

    #[tokio::test]
    async fn test_exists_false_for_empty_file() {
        let (dir, store) = store();
        let key = "job-1/audio_segments.json";
        std::fs::create_dir_all(dir.path().join("job-1")).unwrap();
        std::fs::write(dir.path().join(key), b"").unwrap();

        assert!(!store.exists(key).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_dir, store) = store();
        let err = store.read_bytes("job-1/missing.json").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_json_roundtrip() {
        use lingua_models::{AudioManifest, AudioSegment};

        let (_dir, store) = store();
        let manifest = AudioManifest::new(
            "job-1",
            vec![AudioSegment {
                id: 1,
                text: "hola".to_string(),
                duration_secs: 2.0,
                audio_ref: Some("job-1/audio/segment_1.mp3".to_string()),
            }],
        );
        let key = ArtifactStore::audio_manifest_key("job-1");
        store.write_json(&key, &manifest).await.unwrap();

        let loaded: AudioManifest = store.read_json(&key).await.unwrap();
        assert_eq!(loaded, manifest);
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let (_dir, store) = store();
        assert!(matches!(
            store.resolve("../outside.json"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.resolve("/etc/passwd"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(store.resolve(""), Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_sweep_removes_orphaned_temps() {
        let (dir, store) = store();
        let audio_dir = dir.path().join("job-1/audio");
        std::fs::create_dir_all(&audio_dir).unwrap();
        std::fs::write(audio_dir.join("segment_1.abc123.tmp"), b"partial").unwrap();
        std::fs::write(audio_dir.join("segment_2.mp3"), b"whole").unwrap();

        let removed = store.sweep_temp_files("job-1").await.unwrap();
        assert_eq!(removed, 1);
        assert!(audio_dir.join("segment_2.mp3").exists());
        assert!(!audio_dir.join("segment_1.abc123.tmp").exists());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, store) = store();
        let key = ArtifactStore::lesson_key("job-1");
        store.write_bytes(&key, b"{}").await.unwrap();
        store.delete(&key).await.unwrap();
        store.delete(&key).await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
    }
}
