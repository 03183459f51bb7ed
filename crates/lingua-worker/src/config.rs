//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root directory for per-job artifact working directories
    pub artifact_root: String,
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Maximum concurrent per-segment synthesis calls within one job
    pub max_synthesis_parallel: usize,
    /// How often the executor polls the store for pending jobs
    pub poll_interval: Duration,
    /// Graceful shutdown timeout for in-flight jobs
    pub shutdown_timeout: Duration,
    /// Whether the render stage runs at all
    pub render_enabled: bool,
    /// Exit once no pending jobs remain (one-shot runs)
    pub drain: bool,
    /// Text-to-speech service endpoint
    pub speech_endpoint: String,
    /// Text-to-image service endpoint
    pub image_endpoint: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            artifact_root: "/tmp/linguareel".to_string(),
            max_concurrent_jobs: 2,
            max_synthesis_parallel: 4,
            poll_interval: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(30),
            render_enabled: true,
            drain: false,
            speech_endpoint: "http://localhost:8870".to_string(),
            image_endpoint: "http://localhost:8871".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            artifact_root: std::env::var("LINGUA_ARTIFACT_ROOT")
                .unwrap_or(defaults.artifact_root),
            max_concurrent_jobs: std::env::var("LINGUA_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_jobs),
            max_synthesis_parallel: std::env::var("LINGUA_MAX_SYNTH_PARALLEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_synthesis_parallel),
            poll_interval: Duration::from_secs(
                std::env::var("LINGUA_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("LINGUA_SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            render_enabled: std::env::var("LINGUA_RENDER_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.render_enabled),
            drain: std::env::var("LINGUA_DRAIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.drain),
            speech_endpoint: std::env::var("LINGUA_SPEECH_ENDPOINT")
                .unwrap_or(defaults.speech_endpoint),
            image_endpoint: std::env::var("LINGUA_IMAGE_ENDPOINT")
                .unwrap_or(defaults.image_endpoint),
        }
    }
}
