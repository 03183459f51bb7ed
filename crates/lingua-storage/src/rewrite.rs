//! Stale-prefix correction for stored artifact references.
//!
//! Jobs migrated from an older artifact root carry refs pointing at the old
//! location. The rewrite detects the known stale prefix and replaces it;
//! anything else is left untouched, so running the rewrite again is a no-op.

use lingua_models::{AudioManifest, ImageManifest, Timeline};
use tracing::debug;

fn rewrite_ref(value: &mut String, stale: &str, fresh: &str) -> bool {
    match value.strip_prefix(stale) {
        Some(rest) => {
            *value = format!("{}{}", fresh, rest);
            true
        }
        None => false,
    }
}

fn rewrite_opt_ref(value: &mut Option<String>, stale: &str, fresh: &str) -> bool {
    match value {
        Some(v) => rewrite_ref(v, stale, fresh),
        None => false,
    }
}

/// Rewrite stale audio refs in an audio manifest. Returns refs changed.
pub fn rewrite_audio_manifest(manifest: &mut AudioManifest, stale: &str, fresh: &str) -> usize {
    let mut changed = 0;
    for segment in &mut manifest.segments {
        if rewrite_opt_ref(&mut segment.audio_ref, stale, fresh) {
            changed += 1;
        }
    }
    if changed > 0 {
        debug!(job_id = %manifest.job_id, changed = changed, "rewrote stale audio refs");
    }
    changed
}

/// Rewrite stale image refs in an image manifest. Returns refs changed.
pub fn rewrite_image_manifest(manifest: &mut ImageManifest, stale: &str, fresh: &str) -> usize {
    let mut changed = 0;
    for image in &mut manifest.images {
        if rewrite_ref(&mut image.image_ref, stale, fresh) {
            changed += 1;
        }
    }
    if changed > 0 {
        debug!(job_id = %manifest.job_id, changed = changed, "rewrote stale image refs");
    }
    changed
}

/// Rewrite stale audio and image refs in a timeline. Returns refs changed.
pub fn rewrite_timeline(timeline: &mut Timeline, stale: &str, fresh: &str) -> usize {
    let mut changed = 0;
    for segment in &mut timeline.segments {
        if rewrite_opt_ref(&mut segment.audio_ref, stale, fresh) {
            changed += 1;
        }
        if rewrite_opt_ref(&mut segment.image_ref, stale, fresh) {
            changed += 1;
        }
    }
    if changed > 0 {
        debug!(job_id = %timeline.job_id, changed = changed, "rewrote stale timeline refs");
    }
    changed
}
