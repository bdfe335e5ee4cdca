//! Configuration types for PDF-to-video generation.
//!
//! All pipeline behaviour is controlled through [`GenerationConfig`], built
//! via its [`GenerationConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across tasks, serialise them for logging, and
//! diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A twenty-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::Pdf2ReelError;
use crate::progress::ProgressCallback;
use crate::services::{ClipRenderer, SpeechSynthesizer, Summarizer};
use std::fmt;
use std::sync::Arc;

/// Configuration for one PDF-to-video run.
///
/// Built via [`GenerationConfig::builder()`] or using
/// [`GenerationConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2reel::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .scene_count(4)
///     .target_duration_secs(60.0)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Number of scenes in the plan (and clips in the video). Default: 4.
    ///
    /// The planner is required to return exactly this many scenes; a reply
    /// with a different count is rejected as malformed rather than silently
    /// padded or trimmed.
    pub scene_count: usize,

    /// Target total video length in seconds. Default: 60.
    ///
    /// Scene target durations are normalized so they sum to this value.
    /// The final file can run slightly longer when narration audio outruns
    /// its clip — audio is never truncated to fit.
    pub target_duration_secs: f64,

    /// Per-clip duration tolerance in seconds. Default: 0.5.
    ///
    /// A rendered clip shorter than `target − tolerance` is freeze-padded up
    /// to its target at render time. Clips longer than target are left alone;
    /// the assembler reconciles them against the audio.
    pub duration_tolerance_secs: f64,

    /// Maximum characters of document text sent to the summarizer. Default: 60 000.
    ///
    /// Longer documents are head-truncated on a char boundary before
    /// submission. Head truncation is a deliberate, fixed policy: the front
    /// of a paper (title, abstract, introduction) carries the most summary
    /// signal per character.
    pub truncation_limit: usize,

    /// Number of scenes processed concurrently. Default: 4.
    ///
    /// Rendering and synthesis are independent across scenes, and within a
    /// scene the clip and audio are generated concurrently too. Raise this if
    /// the external services allow it; lower it when hitting rate limits.
    pub concurrency: usize,

    /// Automatic retries per external call on failure. Default: 1.
    ///
    /// One bounded retry catches transient API failures (5xx, timeouts)
    /// without letting a broken backend stall the run. Failures beyond the
    /// retry follow the per-stage policy: fatal for planning, degrade (or
    /// abort, see `abort_on_scene_failure`) for per-scene work.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Summarization model identifier. If None, the service default is used.
    pub model: Option<String>,

    /// Speech voice identifier. Default: "alloy".
    pub voice: String,

    /// Output frame width in pixels. Default: 1280. Must be even (yuv420p).
    pub width: u32,

    /// Output frame height in pixels. Default: 720. Must be even (yuv420p).
    pub height: u32,

    /// Output frame rate. Default: 24.
    pub fps: u32,

    /// Abort the whole run on any scene failure instead of substituting a
    /// placeholder. Default: false (degrade per scene).
    pub abort_on_scene_failure: bool,

    /// Keep the scratch directory (clips, audio, segments) after the run
    /// instead of deleting it. Default: false.
    pub keep_scratch: bool,

    /// API key for the summarization service. If None, read from
    /// `ANTHROPIC_API_KEY`.
    pub llm_api_key: Option<String>,

    /// API key for the speech service. If None, read from `OPENAI_API_KEY`.
    pub tts_api_key: Option<String>,

    /// Pre-constructed summarizer. Takes precedence over `llm_api_key`.
    pub summarizer: Option<Arc<dyn Summarizer>>,

    /// Pre-constructed clip renderer. Takes precedence over the Manim CLI.
    pub renderer: Option<Arc<dyn ClipRenderer>>,

    /// Pre-constructed speech synthesizer. Takes precedence over `tts_api_key`.
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,

    /// Custom planner system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-API-call timeout in seconds (summarization, speech). Default: 60.
    pub api_timeout_secs: u64,

    /// Per-clip render timeout in seconds. Default: 300.
    ///
    /// Animation rendering is by far the slowest stage; a hung renderer
    /// process must not block the join barrier forever.
    pub render_timeout_secs: u64,

    /// Optional progress callback receiving per-scene events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            scene_count: 4,
            target_duration_secs: 60.0,
            duration_tolerance_secs: 0.5,
            truncation_limit: 60_000,
            concurrency: 4,
            max_retries: 1,
            retry_backoff_ms: 500,
            model: None,
            voice: "alloy".to_string(),
            width: 1280,
            height: 720,
            fps: 24,
            abort_on_scene_failure: false,
            keep_scratch: false,
            llm_api_key: None,
            tts_api_key: None,
            summarizer: None,
            renderer: None,
            synthesizer: None,
            system_prompt: None,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            render_timeout_secs: 300,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("scene_count", &self.scene_count)
            .field("target_duration_secs", &self.target_duration_secs)
            .field("duration_tolerance_secs", &self.duration_tolerance_secs)
            .field("truncation_limit", &self.truncation_limit)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("fps", &self.fps)
            .field("abort_on_scene_failure", &self.abort_on_scene_failure)
            .field("keep_scratch", &self.keep_scratch)
            .field("summarizer", &self.summarizer.as_ref().map(|_| "<dyn Summarizer>"))
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn ClipRenderer>"))
            .field(
                "synthesizer",
                &self.synthesizer.as_ref().map(|_| "<dyn SpeechSynthesizer>"),
            )
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }

    /// Per-scene target duration before plan-level weighting, in seconds.
    pub fn even_scene_duration(&self) -> f64 {
        self.target_duration_secs / self.scene_count as f64
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn scene_count(mut self, n: usize) -> Self {
        self.config.scene_count = n.max(1);
        self
    }

    pub fn target_duration_secs(mut self, secs: f64) -> Self {
        self.config.target_duration_secs = secs;
        self
    }

    pub fn duration_tolerance_secs(mut self, secs: f64) -> Self {
        self.config.duration_tolerance_secs = secs.max(0.0);
        self
    }

    pub fn truncation_limit(mut self, chars: usize) -> Self {
        self.config.truncation_limit = chars.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.config.voice = voice.into();
        self
    }

    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    pub fn fps(mut self, fps: u32) -> Self {
        self.config.fps = fps.max(1);
        self
    }

    pub fn abort_on_scene_failure(mut self, v: bool) -> Self {
        self.config.abort_on_scene_failure = v;
        self
    }

    pub fn keep_scratch(mut self, v: bool) -> Self {
        self.config.keep_scratch = v;
        self
    }

    pub fn llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.llm_api_key = Some(key.into());
        self
    }

    pub fn tts_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.tts_api_key = Some(key.into());
        self
    }

    pub fn summarizer(mut self, service: Arc<dyn Summarizer>) -> Self {
        self.config.summarizer = Some(service);
        self
    }

    pub fn renderer(mut self, service: Arc<dyn ClipRenderer>) -> Self {
        self.config.renderer = Some(service);
        self
    }

    pub fn synthesizer(mut self, service: Arc<dyn SpeechSynthesizer>) -> Self {
        self.config.synthesizer = Some(service);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, Pdf2ReelError> {
        let c = &self.config;
        if c.scene_count == 0 {
            return Err(Pdf2ReelError::InvalidConfig("scene_count must be ≥ 1".into()));
        }
        if !(c.target_duration_secs > 0.0) {
            return Err(Pdf2ReelError::InvalidConfig(format!(
                "target_duration_secs must be > 0, got {}",
                c.target_duration_secs
            )));
        }
        if c.concurrency == 0 {
            return Err(Pdf2ReelError::InvalidConfig("concurrency must be ≥ 1".into()));
        }
        if c.width % 2 != 0 || c.height % 2 != 0 {
            // yuv420p output subsamples chroma 2×2, so odd dimensions fail at encode.
            return Err(Pdf2ReelError::InvalidConfig(format!(
                "width and height must be even for yuv420p output, got {}x{}",
                c.width, c.height
            )));
        }
        Ok(self.config)
    }
}
