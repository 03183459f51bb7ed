//! Lesson-video generation worker.
//!
//! Claims pending jobs, derives a lesson script from the source video, and
//! drives per-segment audio and image synthesis into a synchronized timeline
//! that an FFmpeg render turns into the final video. Every stage is
//! idempotent over the per-job artifact directory, so interrupted jobs can
//! be re-run without repeating completed work.

pub mod capabilities;
pub mod classifier;
pub mod config;
pub mod error;
pub mod executor;
pub mod gemini;
pub mod imagery;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod reconcile;
pub mod render;
pub mod retry;
pub mod speech;
pub mod synthesis;

pub use capabilities::{
    ContentAnalyzer, ImageSynthesizer, LessonRenderer, SpeechSynthesizer, SynthesizedAudio,
};
pub use classifier::SceneClassifier;
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use gemini::GeminiAnalyzer;
pub use imagery::RestImageClient;
pub use pipeline::PipelineOrchestrator;
pub use render::FfmpegRenderer;
pub use retry::RetryPolicy;
pub use speech::RestSpeechClient;
pub use synthesis::{ArtifactGenerator, EnsureOutcome};
