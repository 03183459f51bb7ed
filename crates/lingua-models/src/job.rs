//! Lesson video job definitions.
//!
//! A [`VideoJob`] tracks one end-to-end lesson-video generation request. It
//! carries two independent status axes: `status` for the overall pipeline and
//! `video_generation_status` for the final render stage, which can be retried
//! on its own without disturbing the rest of the job.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Overall job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting to be picked up
    #[default]
    Pending,
    /// Job is being processed by a worker
    Processing,
    /// All required stages succeeded
    Completed,
    /// A fatal stage error ended the job
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving to `next` is a legal lifecycle transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Render-stage sub-status, independent of [`JobStatus`].
///
/// `failed` may be re-entered into `generating` (explicit retry), so the
/// render can be redone without re-running earlier stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoGenerationStatus {
    /// Render has not been attempted
    #[default]
    NotStarted,
    /// Render is in progress
    Generating,
    /// Final video was produced
    Completed,
    /// Render failed (retryable)
    Failed,
}

impl VideoGenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoGenerationStatus::NotStarted => "not_started",
            VideoGenerationStatus::Generating => "generating",
            VideoGenerationStatus::Completed => "completed",
            VideoGenerationStatus::Failed => "failed",
        }
    }

    /// End states of the render sub-machine (`failed` stays re-enterable).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VideoGenerationStatus::Completed | VideoGenerationStatus::Failed
        )
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, VideoGenerationStatus::Generating)
    }

    /// Whether moving to `next` is a legal render-stage transition.
    pub fn can_transition_to(&self, next: VideoGenerationStatus) -> bool {
        matches!(
            (self, next),
            (VideoGenerationStatus::NotStarted, VideoGenerationStatus::Generating)
                | (VideoGenerationStatus::Generating, VideoGenerationStatus::Completed)
                | (VideoGenerationStatus::Generating, VideoGenerationStatus::Failed)
                | (VideoGenerationStatus::Failed, VideoGenerationStatus::Generating)
        )
    }
}

impl fmt::Display for VideoGenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Learner level the lesson targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetAudience {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl TargetAudience {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetAudience::Beginner => "beginner",
            TargetAudience::Intermediate => "intermediate",
            TargetAudience::Advanced => "advanced",
        }
    }
}

/// Caller-supplied generation preferences. Immutable after job creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LessonPreferences {
    /// Target duration for each narration segment, in seconds
    #[serde(default = "default_segment_duration")]
    pub target_segment_duration_secs: f64,

    /// Learner level the script should be written for
    #[serde(default)]
    pub audience: TargetAudience,

    /// Narration voice name, if the caller has a preference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

fn default_segment_duration() -> f64 {
    6.0
}

impl Default for LessonPreferences {
    fn default() -> Self {
        Self {
            target_segment_duration_secs: default_segment_duration(),
            audience: TargetAudience::default(),
            voice: None,
        }
    }
}

/// One produced per-segment artifact recorded on the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutputSegment {
    /// Segment identifier (matches the lesson segment id)
    pub id: u32,

    /// Narration text the audio was produced from
    pub text: String,

    /// Location of the produced audio file
    pub audio_ref: String,

    /// Measured audio duration in seconds
    pub duration_secs: f64,
}

/// A lesson-video generation job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoJob {
    /// Unique job ID
    pub id: JobId,

    /// Source video the lesson is derived from
    pub source_url: String,

    /// Overall lifecycle status
    #[serde(default)]
    pub status: JobStatus,

    /// Render-stage sub-status
    #[serde(default)]
    pub video_generation_status: VideoGenerationStatus,

    /// Error message, present only while a status axis is failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Per-segment artifacts produced so far (append-only while processing)
    #[serde(default)]
    pub output_segments: Vec<OutputSegment>,

    /// Caller-supplied preferences, fixed at creation
    #[serde(default)]
    pub preferences: LessonPreferences,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,

    /// First time either axis reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl VideoJob {
    /// Create a new pending job.
    pub fn new(source_url: impl Into<String>, preferences: LessonPreferences) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            source_url: source_url.into(),
            status: JobStatus::Pending,
            video_generation_status: VideoGenerationStatus::NotStarted,
            error_message: None,
            output_segments: Vec::new(),
            preferences,
            created_at: now,
            updated_at: now,
            processed_at: None,
        }
    }

    /// Start processing the job.
    pub fn begin_processing(mut self) -> Self {
        self.status = JobStatus::Processing;
        self.updated_at = Utc::now();
        self
    }

    /// Mark the job as completed.
    pub fn complete(mut self) -> Self {
        self.status = JobStatus::Completed;
        self.stamp_terminal();
        self
    }

    /// Mark the job as failed with a human-readable cause.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.status = JobStatus::Failed;
        self.error_message = Some(error.into());
        self.stamp_terminal();
        self
    }

    /// Start (or retry) the render stage.
    pub fn begin_render(mut self) -> Self {
        // Leaving a failed render clears the message it set.
        if self.video_generation_status == VideoGenerationStatus::Failed {
            self.error_message = None;
        }
        self.video_generation_status = VideoGenerationStatus::Generating;
        self.updated_at = Utc::now();
        self
    }

    /// Mark the render stage as completed.
    pub fn complete_render(mut self) -> Self {
        self.video_generation_status = VideoGenerationStatus::Completed;
        self.stamp_terminal();
        self
    }

    /// Mark the render stage as failed with a human-readable cause.
    pub fn fail_render(mut self, error: impl Into<String>) -> Self {
        self.video_generation_status = VideoGenerationStatus::Failed;
        self.error_message = Some(error.into());
        self.stamp_terminal();
        self
    }

    /// Record one produced segment artifact.
    pub fn push_output_segment(&mut self, segment: OutputSegment) {
        self.output_segments.push(segment);
        self.updated_at = Utc::now();
    }

    fn stamp_terminal(&mut self) {
        let now = Utc::now();
        self.updated_at = now;
        if self.processed_at.is_none() {
            self.processed_at = Some(now);
        }
    }
}

/// Request to create a lesson job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateLessonRequest {
    /// Source video URL
    pub source_url: String,

    /// Generation preferences
    #[serde(default)]
    pub preferences: LessonPreferences,
}

impl CreateLessonRequest {
    /// Validate the request.
    pub fn validate(&self) -> Result<(), String> {
        let url = self.source_url.trim();
        if url.is_empty() {
            return Err("source_url cannot be empty".to_string());
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err("source_url must be an http(s) URL".to_string());
        }
        let dur = self.preferences.target_segment_duration_secs;
        if !dur.is_finite() || dur < 1.0 || dur > 60.0 {
            return Err(format!(
                "target_segment_duration_secs must be between 1 and 60, got {}",
                dur
            ));
        }
        Ok(())
    }

    /// Build the pending job this request describes.
    pub fn into_job(self) -> VideoJob {
        VideoJob::new(self.source_url, self.preferences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation_defaults() {
        let job = VideoJob::new("https://youtube.com/watch?v=abc", LessonPreferences::default());

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.video_generation_status, VideoGenerationStatus::NotStarted);
        assert!(job.error_message.is_none());
        assert!(job.output_segments.is_empty());
        assert!(job.processed_at.is_none());
        assert_eq!(job.created_at, job.updated_at);
    }

    #[test]
    fn test_status_transition_rules() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));

        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn test_render_status_retry_rule() {
        let failed = VideoGenerationStatus::Failed;
        assert!(failed.can_transition_to(VideoGenerationStatus::Generating));
        assert!(!VideoGenerationStatus::Completed.can_transition_to(VideoGenerationStatus::Generating));
        assert!(!VideoGenerationStatus::NotStarted.can_transition_to(VideoGenerationStatus::Completed));
    }

    #[test]
    fn test_fail_sets_message_and_processed_at() {
        let job = VideoJob::new("https://example.com", LessonPreferences::default());
        let failed = job.begin_processing().fail("content generation failed");

        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(
            failed.error_message.as_deref(),
            Some("content generation failed")
        );
        assert!(failed.processed_at.is_some());
    }

    #[test]
    fn test_processed_at_set_only_once() {
        let job = VideoJob::new("https://example.com", LessonPreferences::default());
        let completed = job.begin_processing().complete();
        let first = completed.processed_at;
        assert!(first.is_some());

        // A later render completion must not move the stamp.
        let rendered = completed.begin_render().complete_render();
        assert_eq!(rendered.processed_at, first);
    }

    #[test]
    fn test_render_retry_clears_error_message() {
        let job = VideoJob::new("https://example.com", LessonPreferences::default());
        let failed = job
            .begin_processing()
            .complete()
            .begin_render()
            .fail_render("ffmpeg exited with status 1");
        assert!(failed.error_message.is_some());

        let retried = failed.begin_render();
        assert_eq!(
            retried.video_generation_status,
            VideoGenerationStatus::Generating
        );
        assert!(retried.error_message.is_none());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        let json = serde_json::to_string(&VideoGenerationStatus::NotStarted).unwrap();
        assert_eq!(json, "\"not_started\"");
    }

    #[test]
    fn test_create_request_validation() {
        let ok = CreateLessonRequest {
            source_url: "https://youtube.com/watch?v=abc".to_string(),
            preferences: LessonPreferences::default(),
        };
        assert!(ok.validate().is_ok());

        let empty = CreateLessonRequest {
            source_url: "   ".to_string(),
            preferences: LessonPreferences::default(),
        };
        assert!(empty.validate().is_err());

        let bad_scheme = CreateLessonRequest {
            source_url: "ftp://example.com/video".to_string(),
            preferences: LessonPreferences::default(),
        };
        assert!(bad_scheme.validate().is_err());

        let mut prefs = LessonPreferences::default();
        prefs.target_segment_duration_secs = 0.0;
        let bad_duration = CreateLessonRequest {
            source_url: "https://example.com".to_string(),
            preferences: prefs,
        };
        assert!(bad_duration.validate().is_err());
    }
}
