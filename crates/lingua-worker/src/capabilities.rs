//! Capability traits for external synthesis services.
//!
//! These traits provide a uniform interface for the external collaborators
//! the pipeline drives: content analysis, speech synthesis, image synthesis
//! and the final render. Implementations are constructed explicitly and
//! passed in, which keeps every capability mockable in tests.

use async_trait::async_trait;

use lingua_models::{LessonPreferences, LessonScript, Timeline};

use crate::error::WorkerResult;

/// Narration audio produced by a speech synthesizer.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    /// Encoded audio payload
    pub bytes: Vec<u8>,
    /// Playback duration as reported by the synthesizer
    pub duration_secs: f64,
}

/// Content-analysis capability.
///
/// Derives a lesson script from a source video. The script is structurally
/// typed but semantically opaque: the pipeline never interprets the teaching
/// content, only its shape.
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    /// Generate a lesson script for the source video.
    async fn analyze(
        &self,
        source_url: &str,
        preferences: &LessonPreferences,
    ) -> WorkerResult<LessonScript>;

    /// Capability name for logging.
    fn name(&self) -> &'static str;
}

/// Text-to-speech capability.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize narration audio for one segment's text.
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> WorkerResult<SynthesizedAudio>;

    /// Capability name for logging.
    fn name(&self) -> &'static str;
}

/// Text-to-image capability.
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    /// Synthesize an illustration for the prompt.
    async fn synthesize(&self, prompt: &str) -> WorkerResult<Vec<u8>>;

    /// Capability name for logging.
    fn name(&self) -> &'static str;
}

/// Video-compositing capability.
///
/// Consumed as an opaque `render(timeline) -> file` operation; the timeline
/// descriptor is the single source of truth it reads.
#[async_trait]
pub trait LessonRenderer: Send + Sync {
    /// Compose the final video. Returns the store key of the output file.
    async fn render(&self, timeline: &Timeline) -> WorkerResult<String>;

    /// Whether the renderer can run in this environment.
    fn is_available(&self) -> bool;

    /// Capability name for logging.
    fn name(&self) -> &'static str;
}
