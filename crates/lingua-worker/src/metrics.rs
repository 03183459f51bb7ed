//! Pipeline metrics collection.
//!
//! Standardized metrics for monitoring the lesson pipeline:
//! - Job outcome counters
//! - Per-stage duration histograms
//! - Artifact reuse/production counters

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Jobs claimed for processing.
    pub const JOBS_STARTED_TOTAL: &str = "lingua_jobs_started_total";

    /// Jobs reaching `completed`.
    pub const JOBS_COMPLETED_TOTAL: &str = "lingua_jobs_completed_total";

    /// Jobs reaching `failed`.
    pub const JOBS_FAILED_TOTAL: &str = "lingua_jobs_failed_total";

    /// Stage duration in seconds by stage name.
    pub const STAGE_DURATION_SECONDS: &str = "lingua_stage_duration_seconds";

    /// Artifacts by kind and outcome (reused, produced, failed).
    pub const ARTIFACTS_TOTAL: &str = "lingua_artifacts_total";
}

pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

pub fn record_job_failed() {
    counter!(names::JOBS_FAILED_TOTAL).increment(1);
}

/// Record how long one pipeline stage took.
pub fn record_stage(stage: &'static str, duration: std::time::Duration) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage).record(duration.as_secs_f64());
}

/// Record one artifact outcome: `reused`, `produced`, or `failed`.
pub fn record_artifact(kind: &'static str, outcome: &'static str) {
    counter!(names::ARTIFACTS_TOTAL, "kind" => kind, "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::JOBS_STARTED_TOTAL.starts_with("lingua_"));
        assert!(names::STAGE_DURATION_SECONDS.contains("stage"));
        assert!(names::ARTIFACTS_TOTAL.contains("artifacts"));
    }
}
