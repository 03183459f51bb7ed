//! Shared data models for LinguaReel backend.
//!
//! This crate provides Serde-serializable types for:
//! - Lesson video jobs and their dual status axes
//! - Generated lesson scripts
//! - Artifact file descriptors (audio manifest, image manifest, timeline)
//! - Scene classification results

pub mod job;
pub mod lesson;
pub mod scene;
pub mod timeline;

// Re-export common types
pub use job::{
    CreateLessonRequest, JobId, JobStatus, LessonPreferences, OutputSegment, TargetAudience,
    VideoGenerationStatus, VideoJob,
};
pub use lesson::{LessonScript, LessonSegment};
pub use scene::{SceneCandidate, ScenePattern, SceneReport};
pub use timeline::{
    AudioManifest, AudioSegment, ImageArtifact, ImageManifest, Timeline, TimelineSegment,
    TIMING_EPSILON,
};
