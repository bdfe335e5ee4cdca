//! Per-scene fan-out: clip rendering and narration synthesis.
//!
//! Scenes are independent of each other, and within a scene the clip and
//! the audio are independent too. The fan-out therefore runs scenes through
//! `buffer_unordered(concurrency)` and joins render + synthesis inside each
//! scene with `tokio::join!`. Results land in an (unordered) outcome table
//! keyed by `scene_index`; the assembler re-establishes playback order.
//!
//! ## Failure policy
//!
//! Each backend call gets the configured bounded retry with exponential
//! backoff. A scene that still fails is handled by the degrade policy:
//!
//! * default — substitute a placeholder (blank clip / silent audio) at the
//!   scene's target duration, log it, and mark the outcome degraded;
//! * `abort_on_scene_failure` — convert the failure into a fatal error and
//!   abort the whole run.
//!
//! Failing to even synthesize a placeholder is always fatal: assembly
//! cannot proceed with a hole in the table.

use crate::config::GenerationConfig;
use crate::error::{Pdf2ReelError, SceneError};
use crate::plan::{Scene, ScenePlan};
use crate::pipeline::ffmpeg;
use crate::services::{
    AudioSegment, ClipRenderer, RenderedClip, ServiceError, SpeechSynthesizer,
};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Everything one scene produced, including what went wrong along the way.
#[derive(Debug)]
pub struct SceneOutcome {
    pub scene_index: usize,
    pub clip: RenderedClip,
    pub audio: AudioSegment,
    /// True when the clip is a blank placeholder.
    pub degraded_clip: bool,
    /// True when the audio is generated silence.
    pub degraded_audio: bool,
    /// Retries consumed by the render call.
    pub render_retries: u32,
    /// Retries consumed by the synthesis call.
    pub synth_retries: u32,
    /// The per-scene errors that triggered any substitution above.
    pub errors: Vec<SceneError>,
}

impl SceneOutcome {
    pub fn is_degraded(&self) -> bool {
        self.degraded_clip || self.degraded_audio
    }
}

/// Run one backend call with the configured retry/backoff budget.
///
/// Returns the value and the number of retries it cost.
async fn with_retry<T, F, Fut>(
    max_retries: u32,
    backoff_ms: u64,
    mut call: F,
) -> Result<(T, u32), ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut last_err = None;
    for attempt in 0..=max_retries {
        if attempt > 0 {
            sleep(Duration::from_millis(backoff_ms * 2u64.pow(attempt - 1))).await;
        }
        match call().await {
            Ok(value) => return Ok((value, attempt)),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.expect("at least one attempt ran"))
}

fn render_error(scene: usize, retries: u32, err: ServiceError) -> SceneError {
    match err {
        ServiceError::Timeout { secs } => SceneError::Timeout {
            scene,
            stage: "render".into(),
            secs,
        },
        other => SceneError::RenderFailed {
            scene,
            retries,
            detail: other.to_string(),
        },
    }
}

fn synthesis_error(scene: usize, retries: u32, err: ServiceError) -> SceneError {
    match err {
        ServiceError::Timeout { secs } => SceneError::Timeout {
            scene,
            stage: "synthesis".into(),
            secs,
        },
        other => SceneError::SynthesisFailed {
            scene,
            retries,
            detail: other.to_string(),
        },
    }
}

/// Render and narrate every scene of the plan.
///
/// This is the fan-out half of the fan-out/fan-in pattern; the returned
/// outcomes are unordered. With the default degrade policy every outcome
/// carries a usable clip and audio segment (real or placeholder); under
/// `abort_on_scene_failure` the first scene failure aborts the whole call.
pub async fn collect_scene_assets(
    plan: &ScenePlan,
    renderer: &Arc<dyn ClipRenderer>,
    synthesizer: &Arc<dyn SpeechSynthesizer>,
    config: &GenerationConfig,
    scratch: &Path,
) -> Result<Vec<SceneOutcome>, Pdf2ReelError> {
    let total = plan.len();

    let outcomes: Vec<Result<SceneOutcome, Pdf2ReelError>> =
        stream::iter(plan.scenes().iter().map(|scene| {
            let renderer = Arc::clone(renderer);
            let synthesizer = Arc::clone(synthesizer);
            let config = config.clone();
            let scratch = scratch.to_path_buf();
            async move {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_scene_start(scene.index, total);
                }
                let result =
                    process_scene(scene, &renderer, &synthesizer, &config, &scratch).await;
                if let Some(ref cb) = config.progress_callback {
                    match &result {
                        Ok(outcome) => {
                            cb.on_scene_complete(scene.index, total, outcome.is_degraded())
                        }
                        Err(e) => cb.on_scene_error(scene.index, total, e.to_string()),
                    }
                }
                result
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    outcomes.into_iter().collect()
}

/// Produce one scene's clip and audio, applying retry and degrade policy.
async fn process_scene(
    scene: &Scene,
    renderer: &Arc<dyn ClipRenderer>,
    synthesizer: &Arc<dyn SpeechSynthesizer>,
    config: &GenerationConfig,
    scratch: &Path,
) -> Result<SceneOutcome, Pdf2ReelError> {
    let clip_path = scratch.join(format!("clip_{}.mp4", scene.index));
    let audio_path = scratch.join(format!("audio_{}.wav", scene.index));

    let (clip_result, audio_result) = tokio::join!(
        with_retry(config.max_retries, config.retry_backoff_ms, || {
            renderer.render_clip(scene, &clip_path)
        }),
        with_retry(config.max_retries, config.retry_backoff_ms, || {
            synthesizer.synthesize(scene.index, &scene.narration_text, &audio_path)
        }),
    );

    let mut errors = Vec::new();
    let mut degraded_clip = false;
    let mut degraded_audio = false;

    let (clip, render_retries) = match clip_result {
        Ok((clip, retries)) => (clip, retries),
        Err(e) => {
            let scene_err = render_error(scene.index, config.max_retries, e);
            if config.abort_on_scene_failure {
                return Err(Pdf2ReelError::SceneFailed {
                    scene: scene.index,
                    stage: "render",
                    detail: scene_err.to_string(),
                });
            }
            warn!("{scene_err} — substituting a blank clip");
            ffmpeg::blank_clip(
                &clip_path,
                config.width,
                config.height,
                config.fps,
                scene.target_duration_secs,
            )
            .await
            .map_err(|e| Pdf2ReelError::EncodeFailed {
                detail: format!("placeholder clip for scene {}: {e}", scene.index),
            })?;
            errors.push(scene_err);
            degraded_clip = true;
            (
                RenderedClip {
                    scene_index: scene.index,
                    path: clip_path.clone(),
                    duration_secs: scene.target_duration_secs,
                },
                config.max_retries,
            )
        }
    };

    let (audio, synth_retries) = match audio_result {
        Ok((audio, retries)) => (audio, retries),
        Err(e) => {
            let scene_err = synthesis_error(scene.index, config.max_retries, e);
            if config.abort_on_scene_failure {
                return Err(Pdf2ReelError::SceneFailed {
                    scene: scene.index,
                    stage: "synthesis",
                    detail: scene_err.to_string(),
                });
            }
            warn!("{scene_err} — substituting silence");
            ffmpeg::silence(&audio_path, scene.target_duration_secs)
                .await
                .map_err(|e| Pdf2ReelError::EncodeFailed {
                    detail: format!("placeholder audio for scene {}: {e}", scene.index),
                })?;
            errors.push(scene_err);
            degraded_audio = true;
            (
                AudioSegment {
                    scene_index: scene.index,
                    path: audio_path.clone(),
                    duration_secs: scene.target_duration_secs,
                },
                config.max_retries,
            )
        }
    };

    Ok(SceneOutcome {
        scene_index: scene.index,
        clip,
        audio,
        degraded_clip,
        degraded_audio,
        render_retries,
        synth_retries,
        errors,
    })
}
