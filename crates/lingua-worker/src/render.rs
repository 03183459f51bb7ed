//! FFmpeg lesson renderer.
//!
//! Composes the final video from the synchronized timeline: a slideshow of
//! per-segment images over the concatenated narration audio, assembled with
//! FFmpeg's concat demuxer. Timing entries without an image get a generated
//! placeholder frame; entries without audio get generated silence of the
//! same duration, so the output stays in sync with the timeline.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use async_trait::async_trait;
use lingua_models::Timeline;
use lingua_storage::ArtifactStore;

use crate::capabilities::LessonRenderer;
use crate::error::{WorkerError, WorkerResult};

/// Frame size of placeholder visuals.
const PLACEHOLDER_SIZE: &str = "1280x720";

/// Renders timelines with a local `ffmpeg` binary.
pub struct FfmpegRenderer {
    store: ArtifactStore,
}

impl FfmpegRenderer {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    /// Generate a black placeholder frame for entries without an image.
    async fn ensure_placeholder(&self, render_dir: &Path) -> WorkerResult<PathBuf> {
        let path = render_dir.join("placeholder.png");
        if fs::metadata(&path).await.map(|m| m.len() > 0).unwrap_or(false) {
            return Ok(path);
        }

        run_ffmpeg(
            Command::new("ffmpeg")
                .args([
                    "-y",
                    "-hide_banner",
                    "-loglevel",
                    "error",
                    "-f",
                    "lavfi",
                    "-i",
                    &format!("color=c=black:s={}", PLACEHOLDER_SIZE),
                    "-frames:v",
                    "1",
                ])
                .arg(&path),
            "placeholder frame",
        )
        .await?;
        Ok(path)
    }

    /// Generate silence for entries whose audio synthesis failed.
    async fn ensure_silence(
        &self,
        render_dir: &Path,
        segment_id: u32,
        duration_secs: f64,
    ) -> WorkerResult<PathBuf> {
        let path = render_dir.join(format!("silence_{}.mp3", segment_id));
        if fs::metadata(&path).await.map(|m| m.len() > 0).unwrap_or(false) {
            return Ok(path);
        }

        run_ffmpeg(
            Command::new("ffmpeg")
                .args([
                    "-y",
                    "-hide_banner",
                    "-loglevel",
                    "error",
                    "-f",
                    "lavfi",
                    "-i",
                    "anullsrc=r=44100:cl=mono",
                    "-t",
                    &format!("{:.3}", duration_secs),
                    "-q:a",
                    "9",
                ])
                .arg(&path),
            "silence segment",
        )
        .await?;
        Ok(path)
    }
}

#[async_trait]
impl LessonRenderer for FfmpegRenderer {
    async fn render(&self, timeline: &Timeline) -> WorkerResult<String> {
        if timeline.segments.is_empty() {
            return Err(WorkerError::render_failed("timeline has no segments"));
        }

        let job_id = timeline.job_id.as_str();
        let render_dir = self.store.job_dir(job_id).join("render");
        fs::create_dir_all(&render_dir).await?;

        let placeholder = self.ensure_placeholder(&render_dir).await?;

        // Resolve every entry to concrete media files.
        let mut video_entries = Vec::with_capacity(timeline.segments.len());
        let mut audio_entries = Vec::with_capacity(timeline.segments.len());
        for segment in &timeline.segments {
            let image = match &segment.image_ref {
                Some(key) => self.store.resolve(key)?,
                None => placeholder.clone(),
            };
            video_entries.push((image, segment.duration_secs));

            let audio = match &segment.audio_ref {
                Some(key) => self.store.resolve(key)?,
                None => {
                    self.ensure_silence(&render_dir, segment.id, segment.duration_secs)
                        .await?
                }
            };
            audio_entries.push(audio);
        }

        let video_list = render_dir.join("video.txt");
        fs::write(&video_list, video_concat_script(&video_entries)).await?;
        let audio_list = render_dir.join("audio.txt");
        fs::write(&audio_list, audio_concat_script(&audio_entries)).await?;

        let output_key = ArtifactStore::render_output_key(job_id);
        let output = self.store.resolve(&output_key)?;
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).await?;
        }
        let partial = render_dir.join("lesson.partial.mp4");

        debug!(job_id = job_id, segments = timeline.segments.len(), "composing lesson video");
        run_ffmpeg(
            Command::new("ffmpeg")
                .args(["-y", "-hide_banner", "-loglevel", "error"])
                .args(["-f", "concat", "-safe", "0", "-i"])
                .arg(&video_list)
                .args(["-f", "concat", "-safe", "0", "-i"])
                .arg(&audio_list)
                .args([
                    "-c:v",
                    "libx264",
                    "-pix_fmt",
                    "yuv420p",
                    "-c:a",
                    "aac",
                    "-shortest",
                    "-movflags",
                    "+faststart",
                ])
                .arg(&partial),
            "lesson composition",
        )
        .await?;

        // Publish atomically so a half-written file never looks like a
        // finished render.
        fs::rename(&partial, &output).await?;

        info!(job_id = job_id, output = %output.display(), "rendered lesson video");
        Ok(output_key)
    }

    fn is_available(&self) -> bool {
        which::which("ffmpeg").is_ok()
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

async fn run_ffmpeg(command: &mut Command, what: &str) -> WorkerResult<()> {
    let output = command
        .output()
        .await
        .map_err(|e| WorkerError::render_failed(format!("failed to run ffmpeg: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WorkerError::render_failed(format!(
            "ffmpeg failed composing {}: {}",
            what, stderr
        )));
    }
    Ok(())
}

/// Concat-demuxer script for the image track. The demuxer ignores the last
/// `duration`, so the final frame is repeated once without one.
fn video_concat_script(entries: &[(PathBuf, f64)]) -> String {
    let mut script = String::new();
    for (path, duration) in entries {
        script.push_str(&format!("file '{}'\nduration {:.3}\n", path.display(), duration));
    }
    if let Some((last, _)) = entries.last() {
        script.push_str(&format!("file '{}'\n", last.display()));
    }
    script
}

/// Concat-demuxer script for the narration track.
fn audio_concat_script(entries: &[PathBuf]) -> String {
    entries
        .iter()
        .map(|path| format!("file '{}'\n", path.display()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_concat_script_repeats_last_frame() {
        let entries = vec![
            (PathBuf::from("/work/a.png"), 5.0),
            (PathBuf::from("/work/b.png"), 3.25),
        ];
        let script = video_concat_script(&entries);
        assert_eq!(
            script,
            "file '/work/a.png'\nduration 5.000\nfile '/work/b.png'\nduration 3.250\nfile '/work/b.png'\n"
        );
    }

    #[test]
    fn test_audio_concat_script() {
        let entries = vec![PathBuf::from("/work/1.mp3"), PathBuf::from("/work/2.mp3")];
        assert_eq!(
            audio_concat_script(&entries),
            "file '/work/1.mp3'\nfile '/work/2.mp3'\n"
        );
    }
}
