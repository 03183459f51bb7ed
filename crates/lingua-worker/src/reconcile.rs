//! Timing reconciliation.
//!
//! Lays independently produced audio segments onto one gapless timeline and
//! merges image artifacts into it. Both operations are pure over their
//! inputs: re-running them with the same audio list and image set yields an
//! identical timeline except for the wall-clock `generated_at` field.

use chrono::Utc;
use tracing::{debug, warn};

use lingua_models::{AudioManifest, ImageManifest, Timeline, TimelineSegment};

/// Lay audio segments onto a contiguous timeline.
///
/// `start_time` of segment *i* is the cumulative sum of the durations of
/// segments `0..i` — monotonic and gapless by construction. A segment whose
/// audio synthesis failed still occupies its timing window (the manifest
/// recorded a fallback duration for it); the gap is logged, not raised.
pub fn layout_timeline(manifest: &AudioManifest) -> Timeline {
    let mut segments = Vec::with_capacity(manifest.segments.len());
    let mut cursor = 0.0_f64;

    for audio in &manifest.segments {
        if audio.audio_ref.is_none() {
            warn!(
                job_id = %manifest.job_id,
                segment_id = audio.id,
                "timing entry has no audio artifact, narration gap"
            );
        }
        segments.push(TimelineSegment {
            id: audio.id,
            text: audio.text.clone(),
            duration_secs: audio.duration_secs,
            start_time: cursor,
            end_time: cursor + audio.duration_secs,
            audio_ref: audio.audio_ref.clone(),
            image_ref: None,
        });
        cursor += audio.duration_secs;
    }

    Timeline {
        job_id: manifest.job_id.clone(),
        segments,
        total_duration_secs: cursor,
        generated_at: Utc::now(),
    }
}

/// Merge image references into the timeline.
///
/// Matching is by exact identifier first; when identifiers diverge across
/// pipeline runs (content regenerated), an exact text match between the
/// timing entry and the image's source text serves as fallback. Unmatched
/// entries keep `image_ref` unset — a valid partial state the renderer
/// covers with a placeholder visual.
///
/// Returns the number of entries that received an image.
pub fn attach_images(timeline: &mut Timeline, images: &ImageManifest) -> usize {
    let mut matched = 0;

    for entry in &mut timeline.segments {
        let image = images.get(entry.id).or_else(|| images.by_text(&entry.text));
        match image {
            Some(image) => {
                entry.image_ref = Some(image.image_ref.clone());
                matched += 1;
            }
            None => {
                debug!(
                    job_id = %timeline.job_id,
                    segment_id = entry.id,
                    "no image artifact for timing entry, renderer will use placeholder"
                );
            }
        }
    }

    matched
}
