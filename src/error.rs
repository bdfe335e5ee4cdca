//! Error types for the pdf2reel library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2ReelError`] — **Fatal**: the run cannot produce a video at all
//!   (bad input, unusable scene plan, a missing clip/audio pair at assembly,
//!   encode failure). Returned as `Err(Pdf2ReelError)` from the top-level
//!   `generate*` functions. No output file is written on any fatal path.
//!
//! * [`SceneError`] — **Non-fatal**: a single scene's render or synthesis
//!   failed after its retry. Under the default degrade policy the scene gets
//!   a placeholder clip or silent audio and the run continues; the error is
//!   kept in [`crate::output::SceneReport`] so callers can see exactly which
//!   scenes are degraded.
//!
//! The separation lets callers decide their own tolerance: abort on the
//! first scene failure (`abort_on_scene_failure`), or accept a degraded
//! video and inspect the per-scene reports afterwards.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2reel library.
///
/// Scene-level failures use [`SceneError`] and are stored in
/// [`crate::output::SceneReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Pdf2ReelError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The PDF parsed but yielded no extractable text (e.g. a pure scan).
    #[error("No text could be extracted from '{path}' — nothing to summarize.")]
    EmptyDocument { path: PathBuf },

    /// The PDF text extractor itself failed.
    #[error("Text extraction failed for '{path}': {detail}")]
    TextExtractionFailed { path: PathBuf, detail: String },

    // ── Planner errors ────────────────────────────────────────────────────
    /// No summarization service is configured (missing API key etc.).
    #[error("Summarization service is not configured.\n{hint}")]
    SummarizerNotConfigured { hint: String },

    /// No speech service is configured (missing API key etc.).
    #[error("Speech service is not configured.\n{hint}")]
    SynthesizerNotConfigured { hint: String },

    /// No animation renderer is available (no `manim` binary, no override).
    #[error("Animation renderer is not available.\n{hint}")]
    RendererNotConfigured { hint: String },

    /// The summarization call failed after its bounded retry.
    #[error("Scene planning failed after {attempts} attempts: {detail}")]
    SummarizationFailed { attempts: u32, detail: String },

    /// The summarization reply did not validate into a usable scene plan.
    #[error("Summarization reply is not a usable scene plan: {reason}")]
    MalformedPlan { reason: String },

    // ── Scene errors (abort-on-failure mode only) ────────────────────────
    /// A scene failed and `abort_on_scene_failure` is set.
    ///
    /// Under the default degrade policy this is never returned; the scene
    /// is substituted with a placeholder instead.
    #[error("Scene {scene} failed during {stage}: {detail}")]
    SceneFailed {
        scene: usize,
        stage: &'static str,
        detail: String,
    },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// A scene reached assembly without its clip or audio segment.
    ///
    /// Always fatal: skipping the gap would silently corrupt scene ordering.
    #[error("Scene {scene} is missing its {kind} — cannot assemble")]
    MissingSceneAsset { scene: usize, kind: &'static str },

    /// The `ffmpeg`/`ffprobe` binaries are not on PATH.
    #[error("'{binary}' was not found on PATH — it is required for video assembly.\nInstall ffmpeg and try again.")]
    FfmpegNotFound { binary: &'static str },

    /// An ffmpeg invocation failed (encode, concat, or mux).
    #[error("Video encoding failed: {detail}")]
    EncodeFailed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output video file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single scene.
///
/// Stored in [`crate::output::SceneReport`] when a scene's render or
/// synthesis failed and was substituted with a placeholder. The overall run
/// continues unless `abort_on_scene_failure` is set.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum SceneError {
    /// Clip rendering failed after retries.
    #[error("Scene {scene}: render failed after {retries} retries: {detail}")]
    RenderFailed {
        scene: usize,
        retries: u32,
        detail: String,
    },

    /// Narration synthesis failed after retries.
    #[error("Scene {scene}: synthesis failed after {retries} retries: {detail}")]
    SynthesisFailed {
        scene: usize,
        retries: u32,
        detail: String,
    },

    /// A backend call timed out.
    #[error("Scene {scene}: {stage} timed out after {secs}s")]
    Timeout {
        scene: usize,
        stage: String,
        secs: u64,
    },
}

impl SceneError {
    /// The 0-based scene index this error belongs to.
    pub fn scene(&self) -> usize {
        match self {
            SceneError::RenderFailed { scene, .. }
            | SceneError::SynthesisFailed { scene, .. }
            | SceneError::Timeout { scene, .. } => *scene,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_asset_display() {
        let e = Pdf2ReelError::MissingSceneAsset {
            scene: 2,
            kind: "audio segment",
        };
        let msg = e.to_string();
        assert!(msg.contains("Scene 2"), "got: {msg}");
        assert!(msg.contains("audio segment"), "got: {msg}");
    }

    #[test]
    fn malformed_plan_display() {
        let e = Pdf2ReelError::MalformedPlan {
            reason: "expected 4 scenes, got 3".into(),
        };
        assert!(e.to_string().contains("4 scenes, got 3"));
    }

    #[test]
    fn scene_error_index_accessor() {
        let e = SceneError::RenderFailed {
            scene: 3,
            retries: 1,
            detail: "manim exited with status 1".into(),
        };
        assert_eq!(e.scene(), 3);

        let e = SceneError::Timeout {
            scene: 1,
            stage: "render".into(),
            secs: 300,
        };
        assert_eq!(e.scene(), 1);
    }

    #[test]
    fn ffmpeg_not_found_names_binary() {
        let e = Pdf2ReelError::FfmpegNotFound { binary: "ffprobe" };
        assert!(e.to_string().contains("ffprobe"));
    }

    #[test]
    fn summarization_failed_display() {
        let e = Pdf2ReelError::SummarizationFailed {
            attempts: 2,
            detail: "HTTP 529".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("2 attempts"));
        assert!(msg.contains("529"));
    }
}
