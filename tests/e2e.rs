//! End-to-end integration tests for pdf2reel.
//!
//! Three tiers, so the suite degrades gracefully with what the machine has:
//!
//! 1. **Always run** — mock-driven orchestration tests with no external
//!    tooling at all.
//! 2. **ffmpeg-gated** — full pipeline runs using fake LLM/renderer/speech
//!    backends that synthesize real media with ffmpeg. Skipped (with a
//!    message) when ffmpeg/ffprobe are not on PATH.
//! 3. **Live-gated** — real API calls, behind `E2E_ENABLED=1` plus the
//!    relevant API key. Never run in CI by default.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use pdf2reel::pipeline::ffmpeg;
use pdf2reel::pipeline::scene::collect_scene_assets;
use pdf2reel::services::mock::{canned_reply, MockRenderer, MockSummarizer, MockSynthesizer};
use pdf2reel::services::{
    AudioSegment, ClipRenderer, RenderedClip, ServiceError, SpeechSynthesizer,
};
use pdf2reel::{
    generate, GenerationConfig, Pdf2ReelError, Scene, ScenePlan,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn ffmpeg_ready() -> bool {
    ffmpeg::is_on_path("ffmpeg") && ffmpeg::is_on_path("ffprobe")
}

/// Skip this test when ffmpeg/ffprobe are unavailable.
macro_rules! skip_unless_ffmpeg {
    () => {
        if !ffmpeg_ready() {
            println!("SKIP — ffmpeg/ffprobe not on PATH");
            return;
        }
    };
}

/// Write a minimal single-page PDF containing `text`.
///
/// Object byte offsets are recorded while writing, so the xref table is
/// correct by construction rather than by hand-counted arithmetic.
fn write_minimal_pdf(path: &Path, text: &str) {
    let mut buf: Vec<u8> = Vec::new();
    let mut offsets: Vec<usize> = Vec::new();

    buf.extend_from_slice(b"%PDF-1.4\n");

    let objects = [
        "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n".to_string(),
        "2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n".to_string(),
        "3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>\nendobj\n"
            .to_string(),
        {
            let stream = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET\n");
            format!(
                "4 0 obj\n<< /Length {} >>\nstream\n{stream}endstream\nendobj\n",
                stream.len()
            )
        },
        "5 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>\nendobj\n".to_string(),
    ];

    for object in &objects {
        offsets.push(buf.len());
        buf.extend_from_slice(object.as_bytes());
    }

    let xref_offset = buf.len();
    buf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    buf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        buf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    buf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );

    std::fs::write(path, buf).expect("write test PDF");
}

/// Fake renderer: synthesizes a real blank clip with ffmpeg at the scene's
/// target duration, so downstream assembly works on genuine media.
struct LavfiRenderer;

#[async_trait]
impl ClipRenderer for LavfiRenderer {
    async fn render_clip(
        &self,
        scene: &Scene,
        out_path: &Path,
    ) -> Result<RenderedClip, ServiceError> {
        ffmpeg::blank_clip(out_path, 320, 240, 24, scene.target_duration_secs).await?;
        let duration_secs = ffmpeg::probe_duration(out_path).await?;
        Ok(RenderedClip {
            scene_index: scene.index,
            path: out_path.to_path_buf(),
            duration_secs,
        })
    }

    fn name(&self) -> &str {
        "lavfi-renderer"
    }
}

/// Fake synthesizer: real silence of a fixed duration per scene.
struct LavfiSynthesizer {
    duration_secs: f64,
}

#[async_trait]
impl SpeechSynthesizer for LavfiSynthesizer {
    async fn synthesize(
        &self,
        scene_index: usize,
        _text: &str,
        out_path: &Path,
    ) -> Result<AudioSegment, ServiceError> {
        ffmpeg::silence(out_path, self.duration_secs).await?;
        let duration_secs = ffmpeg::probe_duration(out_path).await?;
        Ok(AudioSegment {
            scene_index,
            path: out_path.to_path_buf(),
            duration_secs,
        })
    }

    fn name(&self) -> &str {
        "lavfi-synthesizer"
    }
}

fn fast_config(scene_count: usize, duration: f64) -> GenerationConfig {
    GenerationConfig::builder()
        .scene_count(scene_count)
        .target_duration_secs(duration)
        .concurrency(scene_count)
        .max_retries(1)
        .retry_backoff_ms(1)
        .resolution(320, 240)
        .build()
        .expect("valid config")
}

// ── Tier 1: mock-driven orchestration tests (always run) ─────────────────────

/// A fixed, well-formed summarizer reply of N=4 scenes must yield exactly
/// 4 rendered clips and 4 audio segments before assembly.
#[tokio::test]
async fn fan_out_produces_four_clip_audio_pairs() {
    let scratch = tempfile::tempdir().unwrap();
    let plan = ScenePlan::from_response(&canned_reply(4), 4, 60.0).unwrap();

    let renderer_mock = Arc::new(MockRenderer::working());
    let synthesizer_mock = Arc::new(MockSynthesizer::working());
    let renderer: Arc<dyn ClipRenderer> = Arc::clone(&renderer_mock) as _;
    let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::clone(&synthesizer_mock) as _;

    let config = fast_config(4, 60.0);
    let outcomes = collect_scene_assets(&plan, &renderer, &synthesizer, &config, scratch.path())
        .await
        .expect("fan-out should succeed");

    assert_eq!(outcomes.len(), 4);
    assert_eq!(renderer_mock.calls(), 4);
    assert_eq!(synthesizer_mock.calls(), 4);

    // One clip file and one audio file per scene, on disk.
    for i in 0..4 {
        assert!(scratch.path().join(format!("clip_{i}.mp4")).exists());
        assert!(scratch.path().join(format!("audio_{i}.wav")).exists());
    }
}

/// Scene ordering survives the unordered fan-out: resolved segments come
/// back in ascending scene order no matter the completion order.
#[tokio::test]
async fn ordering_preserved_through_fan_out_and_resolution() {
    use pdf2reel::pipeline::assemble::resolve_segments;

    let scratch = tempfile::tempdir().unwrap();
    let plan = ScenePlan::from_response(&canned_reply(6), 6, 60.0).unwrap();
    let renderer: Arc<dyn ClipRenderer> = Arc::new(MockRenderer::working());
    let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::new(MockSynthesizer::working());

    let config = fast_config(6, 60.0);
    let outcomes = collect_scene_assets(&plan, &renderer, &synthesizer, &config, scratch.path())
        .await
        .unwrap();

    let clips: Vec<RenderedClip> = outcomes.iter().map(|o| o.clip.clone()).collect();
    let audio: Vec<AudioSegment> = outcomes.iter().map(|o| o.audio.clone()).collect();
    let segments = resolve_segments(&clips, &audio, 6).unwrap();

    let indices: Vec<usize> = segments.iter().map(|s| s.scene_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
}

/// The pad policy never truncates: every resolved duration covers both the
/// clip and the audio, even when audio runs long.
#[tokio::test]
async fn resolved_duration_covers_long_narration() {
    use pdf2reel::pipeline::assemble::{resolve_segments, total_resolved_secs};

    let scratch = tempfile::tempdir().unwrap();
    let plan = ScenePlan::from_response(&canned_reply(2), 2, 30.0).unwrap();
    // Clips exactly on target (15s), audio overruns (18s).
    let renderer: Arc<dyn ClipRenderer> = Arc::new(MockRenderer::working());
    let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::new(MockSynthesizer::with_duration(18.0));

    let config = fast_config(2, 30.0);
    let outcomes = collect_scene_assets(&plan, &renderer, &synthesizer, &config, scratch.path())
        .await
        .unwrap();

    let clips: Vec<RenderedClip> = outcomes.iter().map(|o| o.clip.clone()).collect();
    let audio: Vec<AudioSegment> = outcomes.iter().map(|o| o.audio.clone()).collect();
    let segments = resolve_segments(&clips, &audio, 2).unwrap();

    for segment in &segments {
        assert!(segment.resolved_duration_secs >= segment.clip.duration_secs);
        assert!(segment.resolved_duration_secs >= segment.audio.duration_secs);
        assert!((segment.resolved_duration_secs - 18.0).abs() < 1e-9);
    }
    assert!((total_resolved_secs(&segments) - 36.0).abs() < 1e-9);
}

/// A missing clip/audio pair must abort assembly before any file is written.
#[tokio::test]
async fn missing_pair_aborts_with_no_output_file() {
    use pdf2reel::pipeline::assemble::assemble;
    use pdf2reel::pipeline::scene::SceneOutcome;

    let scratch = tempfile::tempdir().unwrap();
    let out_path = scratch.path().join("final.mp4");

    // Two outcomes for a three-scene run: scene 2 never arrived.
    let outcomes: Vec<SceneOutcome> = (0..2)
        .map(|i| SceneOutcome {
            scene_index: i,
            clip: RenderedClip {
                scene_index: i,
                path: PathBuf::from(format!("/scratch/clip_{i}.mp4")),
                duration_secs: 15.0,
            },
            audio: AudioSegment {
                scene_index: i,
                path: PathBuf::from(format!("/scratch/audio_{i}.wav")),
                duration_secs: 15.0,
            },
            degraded_clip: false,
            degraded_audio: false,
            render_retries: 0,
            synth_retries: 0,
            errors: vec![],
        })
        .collect();

    let err = assemble(&outcomes, 3, 24, scratch.path(), &out_path)
        .await
        .unwrap_err();
    match err {
        Pdf2ReelError::MissingSceneAsset { scene, .. } => assert_eq!(scene, 2),
        other => panic!("expected MissingSceneAsset, got {other:?}"),
    }
    assert!(!out_path.exists(), "no partial artifact may be written");
}

// ── Tier 2: full pipeline with fake backends (ffmpeg-gated) ──────────────────

/// End-to-end: 2 scenes × 2 s → one ~4 s file, ordering and reports intact.
#[tokio::test]
async fn end_to_end_with_fake_backends() {
    skip_unless_ffmpeg!();

    let dir = tempfile::tempdir().unwrap();
    let pdf_path = dir.path().join("paper.pdf");
    write_minimal_pdf(
        &pdf_path,
        "We study attention mechanisms and show they are all you need.",
    );
    let out_path = dir.path().join("summary.mp4");

    let mut config = fast_config(2, 4.0);
    config.summarizer = Some(Arc::new(MockSummarizer::working()));
    config.renderer = Some(Arc::new(LavfiRenderer));
    config.synthesizer = Some(Arc::new(LavfiSynthesizer { duration_secs: 1.5 }));

    let output = generate(pdf_path.to_str().unwrap(), &out_path, &config)
        .await
        .expect("generation should succeed");

    assert!(out_path.exists(), "final video must exist");
    assert_eq!(output.stats.scene_count, 2);
    assert_eq!(output.stats.degraded_scenes, 0);

    // Reports in playback order, one per scene.
    let indices: Vec<usize> = output.scenes.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1]);

    // Final duration ≈ sum of resolved per-scene durations (codec rounding).
    let resolved_total: f64 = output
        .scenes
        .iter()
        .map(|s| s.resolved_duration_secs)
        .sum();
    assert!(
        (output.video.duration_secs - resolved_total).abs() < 0.5,
        "final {}s vs resolved {}s",
        output.video.duration_secs,
        resolved_total
    );

    // Nothing truncated: each resolved duration covers clip and audio.
    for scene in &output.scenes {
        assert!(scene.resolved_duration_secs >= scene.clip_duration_secs - 0.05);
        assert!(scene.resolved_duration_secs >= scene.audio_duration_secs - 0.05);
    }
}

/// A summarizer that returns 3 scenes when 4 are configured must abort the
/// run with no output file.
#[tokio::test]
async fn wrong_scene_count_aborts_run_with_no_output() {
    skip_unless_ffmpeg!();

    let dir = tempfile::tempdir().unwrap();
    let pdf_path = dir.path().join("paper.pdf");
    write_minimal_pdf(&pdf_path, "A paper with enough text to summarize.");
    let out_path = dir.path().join("summary.mp4");

    let mut config = fast_config(4, 60.0);
    config.summarizer = Some(Arc::new(MockSummarizer::short_by_one()));
    config.renderer = Some(Arc::new(LavfiRenderer));
    config.synthesizer = Some(Arc::new(LavfiSynthesizer { duration_secs: 1.0 }));

    let err = generate(pdf_path.to_str().unwrap(), &out_path, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2ReelError::MalformedPlan { .. }), "got {err:?}");
    assert!(!out_path.exists(), "no output on fatal planning failure");
}

/// Default degrade policy: a dead renderer yields a complete video made of
/// placeholder clips, flagged as degraded, with errors reported per scene.
#[tokio::test]
async fn dead_renderer_degrades_instead_of_aborting() {
    skip_unless_ffmpeg!();

    let dir = tempfile::tempdir().unwrap();
    let pdf_path = dir.path().join("paper.pdf");
    write_minimal_pdf(&pdf_path, "A paper whose animations will all fail.");
    let out_path = dir.path().join("summary.mp4");

    let mut config = fast_config(2, 4.0);
    config.summarizer = Some(Arc::new(MockSummarizer::working()));
    config.renderer = Some(Arc::new(MockRenderer::failing()));
    config.synthesizer = Some(Arc::new(LavfiSynthesizer { duration_secs: 1.0 }));

    let output = generate(pdf_path.to_str().unwrap(), &out_path, &config)
        .await
        .expect("degrade policy should keep the run alive");

    assert!(out_path.exists());
    assert!(output.is_degraded());
    assert_eq!(output.stats.degraded_scenes, 2);
    for scene in &output.scenes {
        assert!(scene.degraded_clip);
        assert!(!scene.degraded_audio);
        assert!(!scene.errors.is_empty(), "substitutions must be reported");
    }
}

/// Abort-on-failure mode: the same dead renderer kills the run instead,
/// and no output file appears.
#[tokio::test]
async fn dead_renderer_aborts_in_strict_mode() {
    skip_unless_ffmpeg!();

    let dir = tempfile::tempdir().unwrap();
    let pdf_path = dir.path().join("paper.pdf");
    write_minimal_pdf(&pdf_path, "A paper in strict mode.");
    let out_path = dir.path().join("summary.mp4");

    let mut config = fast_config(2, 4.0);
    config.abort_on_scene_failure = true;
    config.summarizer = Some(Arc::new(MockSummarizer::working()));
    config.renderer = Some(Arc::new(MockRenderer::failing()));
    config.synthesizer = Some(Arc::new(LavfiSynthesizer { duration_secs: 1.0 }));

    let err = generate(pdf_path.to_str().unwrap(), &out_path, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2ReelError::SceneFailed { stage: "render", .. }), "got {err:?}");
    assert!(!out_path.exists());
}

/// A transient planner failure is absorbed by the bounded retry.
#[tokio::test]
async fn flaky_planner_recovers_end_to_end() {
    skip_unless_ffmpeg!();

    let dir = tempfile::tempdir().unwrap();
    let pdf_path = dir.path().join("paper.pdf");
    write_minimal_pdf(&pdf_path, "A paper behind a flaky API.");
    let out_path = dir.path().join("summary.mp4");

    let summarizer = Arc::new(MockSummarizer::flaky(1));
    let mut config = fast_config(2, 4.0);
    config.summarizer = Some(Arc::clone(&summarizer) as _);
    config.renderer = Some(Arc::new(LavfiRenderer));
    config.synthesizer = Some(Arc::new(LavfiSynthesizer { duration_secs: 1.0 }));

    let output = generate(pdf_path.to_str().unwrap(), &out_path, &config)
        .await
        .expect("retry should absorb one transient failure");

    assert_eq!(summarizer.calls(), 2);
    assert_eq!(output.stats.scene_count, 2);
    assert!(out_path.exists());
}

/// The minimal-PDF helper itself: pdf-extract must read the text back.
#[tokio::test]
async fn minimal_pdf_roundtrips_through_text_extraction() {
    use pdf2reel::pipeline::fetch::{extract_document, resolve_input};

    let dir = tempfile::tempdir().unwrap();
    let pdf_path = dir.path().join("tiny.pdf");
    write_minimal_pdf(&pdf_path, "Hello extraction world");

    let resolved = resolve_input(pdf_path.to_str().unwrap(), 5).await.unwrap();
    let document = extract_document(&resolved).await.unwrap();
    assert!(
        document.extracted_text.contains("Hello extraction world"),
        "got: {:?}",
        document.extracted_text
    );
}

// ── Tier 3: live service tests (env-gated, never in CI) ──────────────────────

/// Live planning against the real Anthropic API.
///
/// Run with:
///   E2E_ENABLED=1 ANTHROPIC_API_KEY=... cargo test --test e2e live_plan -- --nocapture
#[tokio::test]
async fn live_plan_from_arxiv() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run live tests");
        return;
    }
    if std::env::var("ANTHROPIC_API_KEY").is_err() {
        println!("SKIP — ANTHROPIC_API_KEY not set");
        return;
    }

    let config = GenerationConfig::builder()
        .scene_count(4)
        .target_duration_secs(60.0)
        .build()
        .unwrap();

    let plan = pdf2reel::plan_scenes("https://arxiv.org/pdf/1706.03762", &config)
        .await
        .expect("live planning should succeed");

    assert_eq!(plan.len(), 4);
    assert!((plan.total_target_secs() - 60.0).abs() < 1e-6);
    for scene in plan.scenes() {
        assert!(!scene.narration_text.is_empty());
        assert!(!scene.animation_directive.code().is_empty());
    }
    println!("Live plan:\n{}", serde_json::to_string_pretty(&plan).unwrap());
}
