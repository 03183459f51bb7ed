//! Artifact file descriptors: audio manifest, image manifest, timeline.
//!
//! These are the explicit schemas of the per-job working-directory files. The
//! timeline file is the single source of truth the renderer consumes.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Tolerance for floating-point timing comparisons.
pub const TIMING_EPSILON: f64 = 1e-6;

/// One produced (or attempted) narration audio artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioSegment {
    /// Segment identifier (the reconciliation key)
    pub id: u32,

    /// Narration text the audio was produced from
    pub text: String,

    /// Audio duration in seconds. When synthesis failed for this item the
    /// preference target duration is recorded instead, keeping layout gapless.
    pub duration_secs: f64,

    /// Location of the audio file; absent when synthesis failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_ref: Option<String>,
}

/// The audio-segments descriptor file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioManifest {
    /// Owning job
    pub job_id: String,

    /// Ordered audio segments
    pub segments: Vec<AudioSegment>,

    /// Sum of all segment durations
    pub total_duration_secs: f64,
}

impl AudioManifest {
    /// Build a manifest, computing the total duration.
    pub fn new(job_id: impl Into<String>, segments: Vec<AudioSegment>) -> Self {
        let total_duration_secs = segments.iter().map(|s| s.duration_secs).sum();
        Self {
            job_id: job_id.into(),
            segments,
            total_duration_secs,
        }
    }

    pub fn get(&self, id: u32) -> Option<&AudioSegment> {
        self.segments.iter().find(|s| s.id == id)
    }
}

/// One scheduled unit of the final video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimelineSegment {
    /// Segment identifier shared across audio and image artifacts
    pub id: u32,

    /// Source narration text
    pub text: String,

    /// Segment duration in seconds
    pub duration_secs: f64,

    /// Start offset from the beginning of the lesson
    pub start_time: f64,

    /// `start_time + duration_secs`
    pub end_time: f64,

    /// Narration audio location, if synthesis succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_ref: Option<String>,

    /// Illustration location, populated once image synthesis completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

/// The synchronized-timeline descriptor file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Timeline {
    /// Owning job
    pub job_id: String,

    /// Segments ordered by `start_time` ascending
    pub segments: Vec<TimelineSegment>,

    /// Total lesson duration
    pub total_duration_secs: f64,

    /// When this file was produced. The only field exempt from the
    /// reconciliation idempotency guarantee.
    pub generated_at: DateTime<Utc>,
}

impl Timeline {
    pub fn segment(&self, id: u32) -> Option<&TimelineSegment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// Verify the layout invariant: segments are contiguous, non-overlapping,
    /// each `end_time = start_time + duration`, and durations sum to the
    /// declared total. A violation is a defect, not a recoverable state.
    pub fn check_contiguity(&self) -> Result<(), String> {
        let mut cursor = 0.0_f64;
        for segment in &self.segments {
            if (segment.start_time - cursor).abs() > TIMING_EPSILON {
                return Err(format!(
                    "segment {} starts at {} but previous segment ended at {}",
                    segment.id, segment.start_time, cursor
                ));
            }
            let expected_end = segment.start_time + segment.duration_secs;
            if (segment.end_time - expected_end).abs() > TIMING_EPSILON {
                return Err(format!(
                    "segment {} ends at {} but start + duration is {}",
                    segment.id, segment.end_time, expected_end
                ));
            }
            cursor = segment.end_time;
        }
        if (cursor - self.total_duration_secs).abs() > TIMING_EPSILON {
            return Err(format!(
                "declared total {} does not match layout end {}",
                self.total_duration_secs, cursor
            ));
        }
        Ok(())
    }
}

/// One generated illustration, with the text it was generated from so that
/// matching survives id drift across pipeline runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImageArtifact {
    /// Segment identifier at generation time
    pub id: u32,

    /// Narration text the image illustrates
    pub text: String,

    /// Location of the image file
    pub image_ref: String,
}

/// The per-job image descriptor file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImageManifest {
    /// Owning job
    pub job_id: String,

    /// Generated images in segment order
    pub images: Vec<ImageArtifact>,
}

impl ImageManifest {
    pub fn new(job_id: impl Into<String>, images: Vec<ImageArtifact>) -> Self {
        Self {
            job_id: job_id.into(),
            images,
        }
    }

    pub fn get(&self, id: u32) -> Option<&ImageArtifact> {
        self.images.iter().find(|i| i.id == id)
    }

    /// Exact-text lookup, the fallback when segment ids diverge across runs.
    pub fn by_text(&self, text: &str) -> Option<&ImageArtifact> {
        self.images.iter().find(|i| i.text == text)
    }
}
