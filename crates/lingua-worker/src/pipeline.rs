//! Lesson pipeline orchestration.
//!
//! Drives one claimed job through every stage: content analysis, scene
//! classification, per-segment audio synthesis, timing reconciliation, image
//! synthesis, and the final render. Stages before the render are resumable:
//! each consults the artifact store before calling any external capability,
//! so re-running a job after a partial failure only performs the missing
//! work.
//!
//! Failure scoping follows the status model. An error from content analysis
//! or reconciliation fails the whole job. A synthesis failure for one
//! segment is recorded against that item alone and the job proceeds. A
//! render failure touches only the render sub-status.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn, Instrument};

use lingua_jobs::{JobStateMachine, JobStore};
use lingua_models::{
    AudioManifest, AudioSegment, ImageArtifact, ImageManifest, JobId, LessonScript, OutputSegment,
    SceneCandidate, SceneReport, Timeline, VideoJob,
};
use lingua_storage::{
    rewrite_audio_manifest, rewrite_image_manifest, rewrite_timeline, ArtifactStore, StorageError,
};

use crate::capabilities::{ContentAnalyzer, ImageSynthesizer, LessonRenderer, SpeechSynthesizer};
use crate::classifier::SceneClassifier;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::reconcile::{attach_images, layout_timeline};
use crate::synthesis::ArtifactGenerator;

/// Runs claimed jobs end to end.
pub struct PipelineOrchestrator {
    config: WorkerConfig,
    store: ArtifactStore,
    jobs: Arc<dyn JobStore>,
    machine: JobStateMachine,
    generator: ArtifactGenerator,
    classifier: SceneClassifier,
    analyzer: Arc<dyn ContentAnalyzer>,
    speech: Arc<dyn SpeechSynthesizer>,
    imagery: Arc<dyn ImageSynthesizer>,
    renderer: Option<Arc<dyn LessonRenderer>>,
}

impl PipelineOrchestrator {
    pub fn new(
        config: WorkerConfig,
        store: ArtifactStore,
        jobs: Arc<dyn JobStore>,
        analyzer: Arc<dyn ContentAnalyzer>,
        speech: Arc<dyn SpeechSynthesizer>,
        imagery: Arc<dyn ImageSynthesizer>,
        renderer: Option<Arc<dyn LessonRenderer>>,
    ) -> Self {
        Self {
            config,
            store: store.clone(),
            jobs: Arc::clone(&jobs),
            machine: JobStateMachine::new(jobs),
            generator: ArtifactGenerator::new(store),
            classifier: SceneClassifier::new(),
            analyzer,
            speech,
            imagery,
            renderer,
        }
    }

    /// The state machine this pipeline transitions jobs through. The executor
    /// uses it to claim pending jobs before handing them here.
    pub fn state_machine(&self) -> &JobStateMachine {
        &self.machine
    }

    /// Run one claimed job to a terminal state. Never returns an error: every
    /// outcome is recorded on the job itself.
    pub async fn run(&self, job: VideoJob) {
        let logger = JobLogger::new(&job.id, "lesson_pipeline");
        let span = logger.create_span();

        async {
            metrics::record_job_started();
            logger.log_start(&format!("processing {}", job.source_url));
            let started = Instant::now();

            match self.process(&job).await {
                Ok(timeline) => {
                    metrics::record_job_completed();
                    if let Err(e) = self.machine.complete(&job.id).await {
                        logger.log_error(&format!("failed to record completion: {}", e));
                        return;
                    }
                    logger.log_completion(&format!(
                        "{} segments, {:.1}s of content, took {:.1}s",
                        timeline.segments.len(),
                        timeline.total_duration_secs,
                        started.elapsed().as_secs_f64()
                    ));
                    self.render_stage(&job.id, &timeline, &logger).await;
                }
                Err(e) => {
                    metrics::record_job_failed();
                    logger.log_error(&e.to_string());
                    if let Err(save_err) = self.machine.fail(&job.id, &e.to_string()).await {
                        logger.log_error(&format!("failed to record failure: {}", save_err));
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Produce every pre-render artifact and return the reconciled timeline.
    ///
    /// Errors escaping this method are fatal to the job; per-item synthesis
    /// failures are absorbed here and recorded in the manifests.
    pub async fn process(&self, job: &VideoJob) -> WorkerResult<Timeline> {
        let job_id = job.id.as_str();

        // A previous crashed run may have left partial temp files behind.
        self.store.sweep_temp_files(job_id).await?;
        self.normalize_refs(job_id).await?;

        let script = self.ensure_script(job).await?;

        let started = Instant::now();
        let scenes = self.classifier.classify(&script);
        metrics::record_stage("classification", started.elapsed());

        let started = Instant::now();
        let manifest = self.ensure_audio(job, &script).await?;
        metrics::record_stage("audio", started.elapsed());

        self.record_output_segments(job, &manifest).await?;

        let started = Instant::now();
        let mut timeline = layout_timeline(&manifest);
        timeline
            .check_contiguity()
            .map_err(WorkerError::Reconciliation)?;
        self.store
            .write_json(&ArtifactStore::timeline_key(job_id), &timeline)
            .await?;
        metrics::record_stage("reconcile", started.elapsed());

        let started = Instant::now();
        let images = self.ensure_images(job, &script, &scenes).await?;
        metrics::record_stage("images", started.elapsed());

        let matched = attach_images(&mut timeline, &images);
        timeline
            .check_contiguity()
            .map_err(WorkerError::Reconciliation)?;
        self.store
            .write_json(&ArtifactStore::timeline_key(job_id), &timeline)
            .await?;
        info!(
            job_id = job_id,
            segments = timeline.segments.len(),
            with_images = matched,
            "timeline reconciled"
        );

        Ok(timeline)
    }

    /// Correct artifact refs left by runs under an older store layout, which
    /// recorded absolute paths instead of store keys. Refs under the current
    /// root are rewritten to key form; everything else is left alone.
    async fn normalize_refs(&self, job_id: &str) -> WorkerResult<()> {
        let stale = format!("{}/", self.store.root().display());

        let key = ArtifactStore::audio_manifest_key(job_id);
        if self.store.exists(&key).await? {
            let mut manifest: AudioManifest = self.store.read_json(&key).await?;
            if rewrite_audio_manifest(&mut manifest, &stale, "") > 0 {
                self.store.write_json(&key, &manifest).await?;
            }
        }

        let key = ArtifactStore::image_manifest_key(job_id);
        if self.store.exists(&key).await? {
            let mut manifest: ImageManifest = self.store.read_json(&key).await?;
            if rewrite_image_manifest(&mut manifest, &stale, "") > 0 {
                self.store.write_json(&key, &manifest).await?;
            }
        }

        let key = ArtifactStore::timeline_key(job_id);
        if self.store.exists(&key).await? {
            let mut timeline: Timeline = self.store.read_json(&key).await?;
            if rewrite_timeline(&mut timeline, &stale, "") > 0 {
                self.store.write_json(&key, &timeline).await?;
            }
        }

        Ok(())
    }

    /// Generate the lesson script, or reuse the one a previous run stored.
    async fn ensure_script(&self, job: &VideoJob) -> WorkerResult<LessonScript> {
        let key = ArtifactStore::lesson_key(job.id.as_str());
        if self.store.exists(&key).await? {
            info!(job_id = %job.id, "reusing existing lesson script");
            metrics::record_artifact("script", "reused");
            return Ok(self.store.read_json(&key).await?);
        }

        let started = Instant::now();
        let script = self
            .analyzer
            .analyze(&job.source_url, &job.preferences)
            .await
            .map_err(|e| match e {
                // Any analyzer failure is a content failure, fatal to the job.
                e if e.is_fatal() => e,
                e => WorkerError::content_failed(e.to_string()),
            })?;
        script.validate().map_err(WorkerError::content_failed)?;
        metrics::record_stage("content", started.elapsed());

        self.store.write_json(&key, &script).await?;
        metrics::record_artifact("script", "produced");
        info!(
            job_id = %job.id,
            title = %script.title,
            segments = script.segments.len(),
            "lesson script generated"
        );
        Ok(script)
    }

    /// Synthesize narration audio for every segment, reusing artifacts from
    /// previous runs. Per-segment failures are recorded in the manifest as
    /// entries without an `audio_ref`.
    async fn ensure_audio(
        &self,
        job: &VideoJob,
        script: &LessonScript,
    ) -> WorkerResult<AudioManifest> {
        let job_id = job.id.as_str();
        let manifest_key = ArtifactStore::audio_manifest_key(job_id);

        // The previous run's manifest carries measured durations for
        // artifacts we are about to reuse.
        let previous: Option<AudioManifest> = match self.store.read_json(&manifest_key).await {
            Ok(manifest) => Some(manifest),
            Err(StorageError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let voice = job.preferences.voice.as_deref();
        let target = job.preferences.target_segment_duration_secs;
        let semaphore = Semaphore::new(self.config.max_synthesis_parallel);

        let tasks = script.segments.iter().map(|segment| {
            let semaphore = &semaphore;
            let key = ArtifactStore::segment_audio_key(job_id, segment.id);
            async move {
                // Closed only on Semaphore::close, which never happens here.
                let _permit = semaphore.acquire().await.ok();
                let result = self
                    .generator
                    .ensure_with(&key, move || async move {
                        let audio = self.speech.synthesize(&segment.text, voice).await?;
                        Ok((audio.bytes, audio.duration_secs))
                    })
                    .await;
                (segment, key, result)
            }
        });

        let mut entries = Vec::with_capacity(script.segments.len());
        let mut failed = 0usize;
        for (segment, key, result) in join_all(tasks).await {
            match result {
                Ok((outcome, Some(duration))) => {
                    debug_assert!(!outcome.reused);
                    metrics::record_artifact("audio", "produced");
                    entries.push(AudioSegment {
                        id: segment.id,
                        text: segment.text.clone(),
                        duration_secs: duration,
                        audio_ref: Some(key),
                    });
                }
                Ok((_, None)) => {
                    metrics::record_artifact("audio", "reused");
                    let duration = previous
                        .as_ref()
                        .and_then(|m| m.get(segment.id))
                        .map(|s| s.duration_secs)
                        .unwrap_or_else(|| {
                            warn!(
                                job_id = job_id,
                                segment_id = segment.id,
                                "reused audio has no recorded duration, using target"
                            );
                            target
                        });
                    entries.push(AudioSegment {
                        id: segment.id,
                        text: segment.text.clone(),
                        duration_secs: duration,
                        audio_ref: Some(key),
                    });
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    // Attributed to this one segment. It keeps its timing
                    // window at the preference target duration.
                    metrics::record_artifact("audio", "failed");
                    failed += 1;
                    warn!(
                        job_id = job_id,
                        segment_id = segment.id,
                        error = %e,
                        "audio synthesis failed for segment"
                    );
                    entries.push(AudioSegment {
                        id: segment.id,
                        text: segment.text.clone(),
                        duration_secs: target,
                        audio_ref: None,
                    });
                }
            }
        }

        let manifest = AudioManifest::new(job_id, entries);
        self.store.write_json(&manifest_key, &manifest).await?;
        info!(
            job_id = job_id,
            segments = manifest.segments.len(),
            failed = failed,
            total_secs = manifest.total_duration_secs,
            "audio synthesis complete"
        );
        Ok(manifest)
    }

    /// Record produced audio artifacts on the job, skipping segments already
    /// recorded by a previous run.
    async fn record_output_segments(
        &self,
        job: &VideoJob,
        manifest: &AudioManifest,
    ) -> WorkerResult<()> {
        for audio in &manifest.segments {
            let Some(audio_ref) = &audio.audio_ref else {
                continue;
            };
            if job.output_segments.iter().any(|s| s.id == audio.id) {
                continue;
            }
            self.jobs
                .append_output_segment(
                    &job.id,
                    OutputSegment {
                        id: audio.id,
                        text: audio.text.clone(),
                        audio_ref: audio_ref.clone(),
                        duration_secs: audio.duration_secs,
                    },
                )
                .await?;
        }
        Ok(())
    }

    /// Synthesize an illustration per segment. Failed items are simply left
    /// out of the manifest; the timeline keeps a valid partial state.
    async fn ensure_images(
        &self,
        job: &VideoJob,
        script: &LessonScript,
        scenes: &SceneReport,
    ) -> WorkerResult<ImageManifest> {
        let job_id = job.id.as_str();
        let semaphore = Semaphore::new(self.config.max_synthesis_parallel);

        let tasks = script.segments.iter().map(|segment| {
            let semaphore = &semaphore;
            let key = ArtifactStore::segment_image_key(job_id, segment.id);
            let prompt = image_prompt(&segment.text, scenes.top_scene());
            async move {
                let _permit = semaphore.acquire().await.ok();
                let prompt = &prompt;
                let result = self
                    .generator
                    .ensure(&key, move || async move {
                        self.imagery.synthesize(prompt).await
                    })
                    .await;
                (segment, key, result)
            }
        });

        let mut images = Vec::with_capacity(script.segments.len());
        for (segment, key, result) in join_all(tasks).await {
            match result {
                Ok(outcome) => {
                    metrics::record_artifact(
                        "image",
                        if outcome.reused { "reused" } else { "produced" },
                    );
                    images.push(ImageArtifact {
                        id: segment.id,
                        text: segment.text.clone(),
                        image_ref: key,
                    });
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    metrics::record_artifact("image", "failed");
                    warn!(
                        job_id = job_id,
                        segment_id = segment.id,
                        error = %e,
                        "image synthesis failed for segment"
                    );
                }
            }
        }

        let manifest = ImageManifest::new(job_id, images);
        self.store
            .write_json(&ArtifactStore::image_manifest_key(job_id), &manifest)
            .await?;
        Ok(manifest)
    }

    /// Run the render stage. Outcomes land on the render sub-status only;
    /// the overall job status is already terminal by the time this runs.
    async fn render_stage(&self, id: &JobId, timeline: &Timeline, logger: &JobLogger) {
        if !self.config.render_enabled {
            info!(job_id = %id, "render disabled, leaving video generation not started");
            return;
        }
        let Some(renderer) = &self.renderer else {
            logger.log_warning("no renderer configured, skipping render stage");
            return;
        };
        if !renderer.is_available() {
            logger.log_warning(&format!(
                "renderer {} unavailable in this environment, skipping render stage",
                renderer.name()
            ));
            return;
        }

        if let Err(e) = self.machine.begin_render(id).await {
            logger.log_error(&format!("could not start render stage: {}", e));
            return;
        }

        let started = Instant::now();
        match renderer.render(timeline).await {
            Ok(output) => {
                metrics::record_stage("render", started.elapsed());
                if let Err(e) = self.machine.complete_render(id).await {
                    logger.log_error(&format!("failed to record render completion: {}", e));
                    return;
                }
                logger.log_completion(&format!("video rendered to {}", output));
            }
            Err(e) => {
                metrics::record_stage("render", started.elapsed());
                logger.log_error(&format!("render failed: {}", e));
                if let Err(save_err) = self.machine.fail_render(id, &e.to_string()).await {
                    logger.log_error(&format!("failed to record render failure: {}", save_err));
                }
            }
        }
    }
}

/// Build the illustration prompt for one segment, steered by the top scene.
fn image_prompt(text: &str, scene: Option<&SceneCandidate>) -> String {
    match scene {
        Some(scene) => format!(
            "Simple flat illustration for a language lesson set in a {} context: {}",
            scene.name, text
        ),
        None => format!("Simple flat illustration for a language lesson: {}", text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_prompt_uses_top_scene() {
        let scene = SceneCandidate {
            name: "restaurant".to_string(),
            confidence: 0.8,
            matched_keywords: vec![],
            cultural_notes: String::new(),
            situations: vec![],
        };
        let prompt = image_prompt("Una mesa para dos", Some(&scene));
        assert!(prompt.contains("restaurant"));
        assert!(prompt.contains("Una mesa para dos"));

        let plain = image_prompt("Hola", None);
        assert!(plain.contains("Hola"));
        assert!(!plain.contains("context"));
    }
}
