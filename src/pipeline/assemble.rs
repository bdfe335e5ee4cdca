//! Assembly: pair clips with audio, reconcile durations, encode, concatenate.
//!
//! This is the fan-in half of the pipeline. It runs only after every scene
//! outcome is available — there is deliberately no partial or incremental
//! assembly, because a gap in the scene table cannot be skipped without
//! corrupting playback order.
//!
//! ## Duration reconciliation
//!
//! For each scene the resolved duration is `max(clip, audio)`: the shorter
//! stream is padded up to it (video by freezing the last frame, audio with
//! silence) and nothing is ever truncated. Trimming the longer stream would
//! either cut narration mid-sentence or cut animation the narration still
//! refers to; padding costs a moment of stillness instead.
//!
//! ## Atomic output
//!
//! The concatenated file is written next to the final output path with a
//! `.tmp` suffix and renamed into place only once encoding succeeded, so a
//! failed run never leaves a partial video behind.

use crate::error::Pdf2ReelError;
use crate::output::FinalVideo;
use crate::pipeline::ffmpeg;
use crate::pipeline::scene::SceneOutcome;
use crate::services::{AudioSegment, RenderedClip};
use std::path::Path;
use tracing::{debug, info};

/// One scene's clip/audio pair with its reconciled duration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSegment {
    pub scene_index: usize,
    pub clip: RenderedClip,
    pub audio: AudioSegment,
    /// `max(clip, audio)` duration, in seconds.
    pub resolved_duration_secs: f64,
}

/// Pair clips and audio segments by scene index and resolve durations.
///
/// Pure function, independent of ffmpeg: all ordering/pairing invariants are
/// enforced here. Every index in `[0, scene_count)` must appear exactly once
/// on both sides; any gap is fatal. The result is sorted by ascending scene
/// index — the playback order.
pub fn resolve_segments(
    clips: &[RenderedClip],
    audio: &[AudioSegment],
    scene_count: usize,
) -> Result<Vec<ResolvedSegment>, Pdf2ReelError> {
    let mut clip_table: Vec<Option<&RenderedClip>> = vec![None; scene_count];
    for clip in clips {
        if clip.scene_index >= scene_count {
            return Err(Pdf2ReelError::Internal(format!(
                "clip for scene {} is out of range (scene_count={})",
                clip.scene_index, scene_count
            )));
        }
        clip_table[clip.scene_index] = Some(clip);
    }

    let mut audio_table: Vec<Option<&AudioSegment>> = vec![None; scene_count];
    for segment in audio {
        if segment.scene_index >= scene_count {
            return Err(Pdf2ReelError::Internal(format!(
                "audio for scene {} is out of range (scene_count={})",
                segment.scene_index, scene_count
            )));
        }
        audio_table[segment.scene_index] = Some(segment);
    }

    let mut resolved = Vec::with_capacity(scene_count);
    for index in 0..scene_count {
        let clip = clip_table[index].ok_or(Pdf2ReelError::MissingSceneAsset {
            scene: index,
            kind: "rendered clip",
        })?;
        let segment = audio_table[index].ok_or(Pdf2ReelError::MissingSceneAsset {
            scene: index,
            kind: "audio segment",
        })?;

        resolved.push(ResolvedSegment {
            scene_index: index,
            clip: clip.clone(),
            audio: segment.clone(),
            resolved_duration_secs: clip.duration_secs.max(segment.duration_secs),
        });
    }

    Ok(resolved)
}

/// Total duration the assembled video will have, in seconds.
pub fn total_resolved_secs(segments: &[ResolvedSegment]) -> f64 {
    segments.iter().map(|s| s.resolved_duration_secs).sum()
}

/// Encode, concatenate, and mux all scene outcomes into the final video.
///
/// Blocks until every segment is encoded. Returns the final artifact and
/// the resolved per-scene segments (for reporting).
pub async fn assemble(
    outcomes: &[SceneOutcome],
    scene_count: usize,
    fps: u32,
    scratch: &Path,
    output_path: &Path,
) -> Result<(FinalVideo, Vec<ResolvedSegment>), Pdf2ReelError> {
    let clips: Vec<RenderedClip> = outcomes.iter().map(|o| o.clip.clone()).collect();
    let audio: Vec<AudioSegment> = outcomes.iter().map(|o| o.audio.clone()).collect();
    let segments = resolve_segments(&clips, &audio, scene_count)?;

    info!(
        "Assembling {} segments, {:.1}s total",
        segments.len(),
        total_resolved_secs(&segments)
    );

    // Encode each pair to one uniformly-coded segment.
    let mut segment_paths = Vec::with_capacity(segments.len());
    for segment in &segments {
        let path = scratch.join(format!("segment_{}.mp4", segment.scene_index));
        ffmpeg::encode_segment(
            &segment.clip.path,
            &segment.audio.path,
            &path,
            segment.resolved_duration_secs,
            fps,
        )
        .await
        .map_err(|e| Pdf2ReelError::EncodeFailed {
            detail: format!("segment {}: {e}", segment.scene_index),
        })?;
        debug!(
            "Encoded segment {} ({:.2}s)",
            segment.scene_index, segment.resolved_duration_secs
        );
        segment_paths.push(path);
    }

    // Concatenate by stream copy in ascending scene order.
    let list_path = scratch.join("segments.txt");
    let list = ffmpeg::concat_list(&segment_paths.iter().map(|p| p.as_path()).collect::<Vec<_>>());
    tokio::fs::write(&list_path, list)
        .await
        .map_err(|e| Pdf2ReelError::Internal(format!("Failed to write concat list: {e}")))?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Pdf2ReelError::OutputWriteFailed {
                    path: output_path.to_path_buf(),
                    source: e,
                })?;
        }
    }

    // Concat to a sibling temp path, then rename into place.
    let tmp_path = output_path.with_extension("mp4.tmp");
    ffmpeg::concat_segments(&list_path, &tmp_path)
        .await
        .map_err(|e| Pdf2ReelError::EncodeFailed {
            detail: format!("concatenation: {e}"),
        })?;

    let duration_secs = ffmpeg::probe_duration(&tmp_path)
        .await
        .map_err(|e| Pdf2ReelError::EncodeFailed {
            detail: format!("probing final output: {e}"),
        })?;

    tokio::fs::rename(&tmp_path, output_path)
        .await
        .map_err(|e| Pdf2ReelError::OutputWriteFailed {
            path: output_path.to_path_buf(),
            source: e,
        })?;

    Ok((
        FinalVideo {
            path: output_path.to_path_buf(),
            duration_secs,
        },
        segments,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn clip(index: usize, duration: f64) -> RenderedClip {
        RenderedClip {
            scene_index: index,
            path: PathBuf::from(format!("/scratch/clip_{index}.mp4")),
            duration_secs: duration,
        }
    }

    fn segment(index: usize, duration: f64) -> AudioSegment {
        AudioSegment {
            scene_index: index,
            path: PathBuf::from(format!("/scratch/audio_{index}.wav")),
            duration_secs: duration,
        }
    }

    #[test]
    fn resolves_in_ascending_scene_order() {
        // Outcomes arrive unordered from the fan-out.
        let clips = vec![clip(2, 15.0), clip(0, 14.0), clip(1, 16.0)];
        let audio = vec![segment(1, 15.0), segment(2, 15.5), segment(0, 13.0)];

        let resolved = resolve_segments(&clips, &audio, 3).unwrap();
        let indices: Vec<usize> = resolved.iter().map(|s| s.scene_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn resolved_duration_is_max_of_pair() {
        let clips = vec![clip(0, 14.0), clip(1, 16.0)];
        let audio = vec![segment(0, 15.5), segment(1, 12.0)];

        let resolved = resolve_segments(&clips, &audio, 2).unwrap();
        assert!((resolved[0].resolved_duration_secs - 15.5).abs() < 1e-9);
        assert!((resolved[1].resolved_duration_secs - 16.0).abs() < 1e-9);

        // Never below either input: narration survives intact.
        for seg in &resolved {
            assert!(seg.resolved_duration_secs >= seg.clip.duration_secs);
            assert!(seg.resolved_duration_secs >= seg.audio.duration_secs);
        }
    }

    #[test]
    fn total_is_sum_of_resolved_durations() {
        let clips = vec![clip(0, 15.0), clip(1, 15.0)];
        let audio = vec![segment(0, 16.0), segment(1, 14.0)];
        let resolved = resolve_segments(&clips, &audio, 2).unwrap();
        assert!((total_resolved_secs(&resolved) - 31.0).abs() < 1e-9);
    }

    #[test]
    fn missing_clip_is_fatal() {
        let clips = vec![clip(0, 15.0)];
        let audio = vec![segment(0, 15.0), segment(1, 15.0)];

        let err = resolve_segments(&clips, &audio, 2).unwrap_err();
        match err {
            Pdf2ReelError::MissingSceneAsset { scene, kind } => {
                assert_eq!(scene, 1);
                assert_eq!(kind, "rendered clip");
            }
            other => panic!("expected MissingSceneAsset, got {other:?}"),
        }
    }

    #[test]
    fn missing_audio_is_fatal() {
        let clips = vec![clip(0, 15.0), clip(1, 15.0)];
        let audio = vec![segment(1, 15.0)];

        let err = resolve_segments(&clips, &audio, 2).unwrap_err();
        match err {
            Pdf2ReelError::MissingSceneAsset { scene, kind } => {
                assert_eq!(scene, 0);
                assert_eq!(kind, "audio segment");
            }
            other => panic!("expected MissingSceneAsset, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_index_is_internal_error() {
        let clips = vec![clip(5, 15.0)];
        let audio = vec![segment(0, 15.0)];
        let err = resolve_segments(&clips, &audio, 1).unwrap_err();
        assert!(matches!(err, Pdf2ReelError::Internal(_)));
    }

    #[test]
    fn empty_plan_resolves_to_nothing() {
        let resolved = resolve_segments(&[], &[], 0).unwrap();
        assert!(resolved.is_empty());
        assert_eq!(total_resolved_secs(&resolved), 0.0);
    }
}
