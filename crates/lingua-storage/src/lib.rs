//! Filesystem artifact store for job working directories.
//!
//! This crate provides:
//! - Per-job artifact layout (manifests, timeline, media, render output)
//! - Existence checks that skip redundant regeneration
//! - Atomic writes (temp sibling + rename)
//! - Orphaned temp-file sweeping
//! - Stale-prefix ref correction for migrated jobs

pub mod error;
pub mod rewrite;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use rewrite::{rewrite_audio_manifest, rewrite_image_manifest, rewrite_timeline};
pub use store::{ArtifactStore, StoreConfig};
