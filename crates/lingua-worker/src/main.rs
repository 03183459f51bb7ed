//! Worker binary: wires configuration, capability clients and the job
//! executor together, then polls until shutdown.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lingua_jobs::{InMemoryJobStore, JobStore};
use lingua_models::{CreateLessonRequest, LessonPreferences};
use lingua_storage::ArtifactStore;
use lingua_worker::{
    FfmpegRenderer, GeminiAnalyzer, JobExecutor, LessonRenderer, PipelineOrchestrator,
    RestImageClient, RestSpeechClient, WorkerConfig, WorkerError, WorkerResult,
};

#[tokio::main]
async fn main() -> WorkerResult<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| WorkerError::config_error("failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_logging();
    init_metrics();

    let config = WorkerConfig::from_env();
    info!(
        artifact_root = %config.artifact_root,
        max_jobs = config.max_concurrent_jobs,
        render_enabled = config.render_enabled,
        "starting lesson worker"
    );

    let store = ArtifactStore::new(&config.artifact_root);
    let jobs: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    seed_job_from_env(&jobs).await?;

    let analyzer = Arc::new(GeminiAnalyzer::new()?);
    let speech = Arc::new(RestSpeechClient::new(config.speech_endpoint.clone()));
    let imagery = Arc::new(RestImageClient::new(config.image_endpoint.clone()));

    let renderer = FfmpegRenderer::new(store.clone());
    let renderer: Option<Arc<dyn LessonRenderer>> = if renderer.is_available() {
        Some(Arc::new(renderer))
    } else {
        warn!("ffmpeg not found on PATH, videos will not be rendered");
        None
    };

    let pipeline = Arc::new(PipelineOrchestrator::new(
        config.clone(),
        store,
        Arc::clone(&jobs),
        analyzer,
        speech,
        imagery,
        renderer,
    ));

    let executor = Arc::new(JobExecutor::new(config, jobs, pipeline));
    let signal_target = Arc::clone(&executor);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            signal_target.shutdown();
        }
    });

    executor.run().await;
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lingua=info"));
    let format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn init_metrics() {
    let Ok(addr) = std::env::var("LINGUA_METRICS_ADDR") else {
        return;
    };
    let Ok(addr) = addr.parse::<std::net::SocketAddr>() else {
        warn!(addr = %addr, "LINGUA_METRICS_ADDR is not a valid socket address");
        return;
    };
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => info!(addr = %addr, "prometheus exporter listening"),
        Err(e) => warn!(error = %e, "failed to start prometheus exporter"),
    }
}

/// One-shot convenience: enqueue a job for `LINGUA_SOURCE_URL` at startup.
/// Pairs with drain mode for single-video runs.
async fn seed_job_from_env(jobs: &Arc<dyn JobStore>) -> WorkerResult<()> {
    let Ok(source_url) = std::env::var("LINGUA_SOURCE_URL") else {
        return Ok(());
    };

    let request = CreateLessonRequest {
        source_url,
        preferences: LessonPreferences::default(),
    };
    request.validate().map_err(WorkerError::config_error)?;

    let job = request.into_job();
    info!(job_id = %job.id, source_url = %job.source_url, "seeded job from environment");
    jobs.insert(job).await?;
    Ok(())
}
