//! Output types returned by the generation entry points.

use crate::error::SceneError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The terminal artifact: one muxed H.264/AAC MP4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalVideo {
    /// Where the file was written.
    pub path: PathBuf,
    /// Measured duration of the file, in seconds.
    pub duration_secs: f64,
}

/// What happened to one scene, for reporting and `--json` output.
///
/// Degraded scenes carry the [`SceneError`]s that triggered the
/// substitution, so a caller can tell exactly which parts of the video are
/// placeholders and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneReport {
    /// 0-based playback position.
    pub index: usize,
    /// Length of the narration text, in characters.
    pub narration_chars: usize,
    /// Measured clip duration before reconciliation, in seconds.
    pub clip_duration_secs: f64,
    /// Measured audio duration before reconciliation, in seconds.
    pub audio_duration_secs: f64,
    /// Final duration of this scene's segment, in seconds.
    pub resolved_duration_secs: f64,
    /// True when the clip is a blank placeholder.
    pub degraded_clip: bool,
    /// True when the audio is generated silence.
    pub degraded_audio: bool,
    /// Retries consumed by the render call.
    pub render_retries: u32,
    /// Retries consumed by the synthesis call.
    pub synth_retries: u32,
    /// The per-scene failures behind any substitution above.
    pub errors: Vec<SceneError>,
}

impl SceneReport {
    pub fn is_degraded(&self) -> bool {
        self.degraded_clip || self.degraded_audio
    }
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Number of scenes in the plan (and segments in the video).
    pub scene_count: usize,
    /// Scenes that ended up with a placeholder clip or silent audio.
    pub degraded_scenes: usize,
    /// Sum of planned per-scene targets, in seconds.
    pub planned_duration_secs: f64,
    /// Measured duration of the final file, in seconds.
    pub final_duration_secs: f64,
    /// Wall-clock spent fetching and extracting the document.
    pub fetch_duration_ms: u64,
    /// Wall-clock spent in the summarization call(s).
    pub plan_duration_ms: u64,
    /// Wall-clock spent in per-scene rendering/synthesis (fan-out).
    pub scenes_duration_ms: u64,
    /// Wall-clock spent encoding, concatenating, and muxing.
    pub assemble_duration_ms: u64,
    /// Total wall-clock for the run.
    pub total_duration_ms: u64,
}

/// Result of a successful run: the video plus per-scene detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// The muxed output file.
    pub video: FinalVideo,
    /// One report per scene, in playback order.
    pub scenes: Vec<SceneReport>,
    /// Aggregate timings and counts.
    pub stats: GenerationStats,
}

impl GenerationOutput {
    /// Whether any scene was substituted with a placeholder.
    pub fn is_degraded(&self) -> bool {
        self.scenes.iter().any(|s| s.is_degraded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(index: usize, degraded_clip: bool) -> SceneReport {
        SceneReport {
            index,
            narration_chars: 120,
            clip_duration_secs: 15.0,
            audio_duration_secs: 14.2,
            resolved_duration_secs: 15.0,
            degraded_clip,
            degraded_audio: false,
            render_retries: 0,
            synth_retries: 0,
            errors: vec![],
        }
    }

    #[test]
    fn degraded_flag_bubbles_up() {
        let output = GenerationOutput {
            video: FinalVideo {
                path: PathBuf::from("summary_video.mp4"),
                duration_secs: 60.2,
            },
            scenes: vec![report(0, false), report(1, true)],
            stats: GenerationStats::default(),
        };
        assert!(output.is_degraded());
        assert!(!output.scenes[0].is_degraded());
        assert!(output.scenes[1].is_degraded());
    }

    #[test]
    fn output_serialises_round_trip() {
        let output = GenerationOutput {
            video: FinalVideo {
                path: PathBuf::from("out.mp4"),
                duration_secs: 59.8,
            },
            scenes: vec![report(0, false)],
            stats: GenerationStats {
                scene_count: 1,
                final_duration_secs: 59.8,
                ..Default::default()
            },
        };
        let json = serde_json::to_string_pretty(&output).unwrap();
        let back: GenerationOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back.video, output.video);
        assert_eq!(back.stats.scene_count, 1);
    }
}
