//! Generation entry points: the orchestration sequence.
//!
//! This module is the whole story of the pipeline, in order:
//!
//! 1. resolve the input and extract its text ([`crate::pipeline::fetch`])
//! 2. plan the scenes ([`crate::pipeline::plan`])
//! 3. fan out per-scene render + synthesis ([`crate::pipeline::scene`])
//! 4. fan in at the assembler ([`crate::pipeline::assemble`])
//!
//! Everything hard is delegated — the LLM plans, Manim draws, the speech
//! API talks, ffmpeg encodes. What lives here is the part that must be
//! *correct* rather than clever: service resolution, stage sequencing,
//! the fatal/degrade split, and the guarantee that a fatal error never
//! leaves a partial video behind.

use crate::config::GenerationConfig;
use crate::error::Pdf2ReelError;
use crate::output::{GenerationOutput, GenerationStats, SceneReport};
use crate::pipeline::{assemble, fetch, ffmpeg, plan as planning, scene};
use crate::plan::ScenePlan;
use crate::services::anthropic::AnthropicSummarizer;
use crate::services::manim::ManimRenderer;
use crate::services::tts::OpenAiSpeech;
use crate::services::{ClipRenderer, SpeechSynthesizer, Summarizer};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Generate a narrated summary video from a PDF file or URL.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input`       — Local file path or HTTP/HTTPS URL to a PDF
/// * `output_path` — Where the final MP4 is written (atomically)
/// * `config`      — Generation configuration
///
/// # Returns
/// `Ok(GenerationOutput)` on success, even if some scenes were substituted
/// with placeholders (check `output.is_degraded()` and the per-scene
/// reports).
///
/// # Errors
/// Returns `Err(Pdf2ReelError)` only for fatal errors: unreachable or
/// invalid input, an unusable scene plan after the bounded retry, a scene
/// failure under `abort_on_scene_failure`, a missing clip/audio pair at
/// assembly, or an encode failure. No output file exists on any error path.
///
/// # Cancellation
/// Dropping the returned future aborts in-flight service calls and removes
/// the scratch directory (clips, audio, segments) along with any downloaded
/// input; nothing the run created outlives it except a completed output.
pub async fn generate(
    input: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &GenerationConfig,
) -> Result<GenerationOutput, Pdf2ReelError> {
    let total_start = Instant::now();
    let input = input.as_ref();
    let output_path = output_path.as_ref();
    info!("Starting generation: {} -> {}", input, output_path.display());

    // ── Step 0: Fail fast on missing tooling ────────────────────────────
    ffmpeg::ensure_available()?;

    // ── Step 1: Resolve input & extract text ────────────────────────────
    let fetch_start = Instant::now();
    let resolved = fetch::resolve_input(input, config.download_timeout_secs).await?;
    let document = fetch::extract_document(&resolved).await?;
    let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;
    info!(
        "Document ready: {} bytes, {} chars of text, {}ms",
        document.byte_len,
        document.extracted_text.chars().count(),
        fetch_duration_ms
    );

    // ── Step 2: Resolve services ─────────────────────────────────────────
    let summarizer = resolve_summarizer(config)?;
    let renderer = resolve_renderer(config)?;
    let synthesizer = resolve_synthesizer(config)?;

    // ── Step 3: Plan scenes ──────────────────────────────────────────────
    let plan_start = Instant::now();
    let plan = planning::build_plan(&summarizer, &document.extracted_text, config).await?;
    let plan_duration_ms = plan_start.elapsed().as_millis() as u64;
    drop(document);

    if let Some(ref cb) = config.progress_callback {
        cb.on_plan_ready(plan.len());
    }
    info!(
        "Planned {} scenes ({:.1}s target) in {}ms",
        plan.len(),
        plan.total_target_secs(),
        plan_duration_ms
    );

    // ── Step 4: Fan out per-scene render ∥ synthesis ────────────────────
    let scratch = tempfile::TempDir::new()
        .map_err(|e| Pdf2ReelError::Internal(format!("Failed to create scratch dir: {e}")))?;

    let scenes_start = Instant::now();
    let mut outcomes =
        scene::collect_scene_assets(&plan, &renderer, &synthesizer, config, scratch.path())
            .await?;
    let scenes_duration_ms = scenes_start.elapsed().as_millis() as u64;

    outcomes.sort_by_key(|o| o.scene_index);
    for outcome in &outcomes {
        for error in &outcome.errors {
            warn!("Degraded output: {error}");
        }
    }

    // ── Step 5: Assemble (join point) ────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_assembly_start(plan.len());
    }
    let assemble_start = Instant::now();
    let (video, segments) = assemble::assemble(
        &outcomes,
        config.scene_count,
        config.fps,
        scratch.path(),
        output_path,
    )
    .await?;
    let assemble_duration_ms = assemble_start.elapsed().as_millis() as u64;

    // ── Step 6: Reports & stats ──────────────────────────────────────────
    let scenes_report: Vec<SceneReport> = outcomes
        .iter()
        .zip(&segments)
        .map(|(outcome, segment)| SceneReport {
            index: outcome.scene_index,
            narration_chars: plan.scenes()[outcome.scene_index]
                .narration_text
                .chars()
                .count(),
            clip_duration_secs: outcome.clip.duration_secs,
            audio_duration_secs: outcome.audio.duration_secs,
            resolved_duration_secs: segment.resolved_duration_secs,
            degraded_clip: outcome.degraded_clip,
            degraded_audio: outcome.degraded_audio,
            render_retries: outcome.render_retries,
            synth_retries: outcome.synth_retries,
            errors: outcome.errors.clone(),
        })
        .collect();

    let degraded_scenes = scenes_report.iter().filter(|s| s.is_degraded()).count();
    let stats = GenerationStats {
        scene_count: plan.len(),
        degraded_scenes,
        planned_duration_secs: plan.total_target_secs(),
        final_duration_secs: video.duration_secs,
        fetch_duration_ms,
        plan_duration_ms,
        scenes_duration_ms,
        assemble_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(plan.len(), degraded_scenes);
    }

    if degraded_scenes > 0 {
        warn!(
            "Run complete but degraded: {}/{} scenes carry placeholders",
            degraded_scenes,
            plan.len()
        );
    }
    info!(
        "Generation complete: {:.1}s of video in {}ms -> {}",
        video.duration_secs,
        stats.total_duration_ms,
        video.path.display()
    );

    if config.keep_scratch {
        let kept = scratch.keep();
        info!("Scratch kept at {}", kept.display());
    }

    Ok(GenerationOutput {
        video,
        scenes: scenes_report,
        stats,
    })
}

/// Plan scenes for a PDF without rendering anything.
///
/// Needs only the summarization service — no Manim, no speech API, no
/// ffmpeg. Useful for previewing (and versioning) what the video would say.
pub async fn plan(
    input: impl AsRef<str>,
    config: &GenerationConfig,
) -> Result<ScenePlan, Pdf2ReelError> {
    let resolved = fetch::resolve_input(input.as_ref(), config.download_timeout_secs).await?;
    let document = fetch::extract_document(&resolved).await?;
    let summarizer = resolve_summarizer(config)?;
    planning::build_plan(&summarizer, &document.extracted_text, config).await
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    input: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &GenerationConfig,
) -> Result<GenerationOutput, Pdf2ReelError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2ReelError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(generate(input, output_path, config))
}

// ── Service resolution ───────────────────────────────────────────────────

/// Resolve the summarizer, from most-specific to least-specific.
///
/// 1. **Pre-built service** (`config.summarizer`) — the caller constructed
///    and configured it entirely; used as-is. This is how tests inject
///    deterministic fakes.
/// 2. **Explicit key** (`config.llm_api_key`).
/// 3. **Environment** (`ANTHROPIC_API_KEY`).
fn resolve_summarizer(config: &GenerationConfig) -> Result<Arc<dyn Summarizer>, Pdf2ReelError> {
    if let Some(ref service) = config.summarizer {
        return Ok(Arc::clone(service));
    }

    let client = if let Some(ref key) = config.llm_api_key {
        Some(AnthropicSummarizer::new(
            key,
            config.model.as_deref(),
            config.api_timeout_secs,
        ))
    } else {
        AnthropicSummarizer::from_env(config.model.as_deref(), config.api_timeout_secs)
    };

    let client = client.ok_or_else(|| Pdf2ReelError::SummarizerNotConfigured {
        hint: "Set ANTHROPIC_API_KEY, pass llm_api_key, or provide a custom Summarizer.".into(),
    })?;

    let client = match config.system_prompt {
        Some(ref prompt) => client.with_system_prompt(prompt.clone()),
        None => client,
    };

    Ok(Arc::new(client))
}

/// Resolve the clip renderer: a pre-built override or the Manim CLI.
fn resolve_renderer(config: &GenerationConfig) -> Result<Arc<dyn ClipRenderer>, Pdf2ReelError> {
    if let Some(ref service) = config.renderer {
        return Ok(Arc::clone(service));
    }

    if !ManimRenderer::is_available() {
        return Err(Pdf2ReelError::RendererNotConfigured {
            hint: "The `manim` binary is not on PATH. Install it (pip install manim) or provide a custom ClipRenderer.".into(),
        });
    }

    Ok(Arc::new(ManimRenderer::new(
        config.width,
        config.height,
        config.fps,
        config.duration_tolerance_secs,
        config.render_timeout_secs,
    )))
}

/// Resolve the speech synthesizer, same chain as the summarizer.
fn resolve_synthesizer(
    config: &GenerationConfig,
) -> Result<Arc<dyn SpeechSynthesizer>, Pdf2ReelError> {
    if let Some(ref service) = config.synthesizer {
        return Ok(Arc::clone(service));
    }

    let client = if let Some(ref key) = config.tts_api_key {
        Some(OpenAiSpeech::new(
            key,
            config.voice.clone(),
            config.api_timeout_secs,
        ))
    } else {
        OpenAiSpeech::from_env(config.voice.clone(), config.api_timeout_secs)
    };

    client
        .map(|c| Arc::new(c) as Arc<dyn SpeechSynthesizer>)
        .ok_or_else(|| Pdf2ReelError::SynthesizerNotConfigured {
            hint: "Set OPENAI_API_KEY, pass tts_api_key, or provide a custom SpeechSynthesizer."
                .into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::{MockRenderer, MockSummarizer, MockSynthesizer};

    #[test]
    fn prebuilt_services_take_priority() {
        let config = GenerationConfig::builder()
            .summarizer(Arc::new(MockSummarizer::working()))
            .renderer(Arc::new(MockRenderer::working()))
            .synthesizer(Arc::new(MockSynthesizer::working()))
            .build()
            .unwrap();

        assert_eq!(resolve_summarizer(&config).unwrap().name(), "mock-summarizer");
        assert_eq!(resolve_renderer(&config).unwrap().name(), "mock-renderer");
        assert_eq!(
            resolve_synthesizer(&config).unwrap().name(),
            "mock-synthesizer"
        );
    }

    #[test]
    fn explicit_keys_build_real_clients() {
        let config = GenerationConfig::builder()
            .llm_api_key("sk-ant-test")
            .tts_api_key("sk-test")
            .build()
            .unwrap();

        assert_eq!(resolve_summarizer(&config).unwrap().name(), "anthropic");
        assert_eq!(resolve_synthesizer(&config).unwrap().name(), "openai-speech");
    }
}
