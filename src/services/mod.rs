//! Capability interfaces for the three external services.
//!
//! Every hard capability in this pipeline is delegated: summarization to an
//! LLM API, animation rendering to the Manim CLI, narration to a speech API.
//! Each gets a small object-safe trait so the orchestration in
//! [`crate::generate`] never knows which backend it is talking to — in
//! production the real clients below, in tests the deterministic fakes from
//! [`mock`].
//!
//! All three services are non-deterministic and rate-limited from the
//! pipeline's point of view; retry/backoff and timeout policy live in the
//! pipeline stages, not here. A service does exactly one attempt per call.

pub mod anthropic;
pub mod manim;
pub mod mock;
pub mod tts;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::plan::Scene;

/// A single failed service call.
///
/// Pipeline stages map these into [`crate::error::SceneError`] (per-scene
/// work) or [`crate::error::Pdf2ReelError`] (planning) after the retry
/// policy has run its course.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The backend returned an HTTP error status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never completed within the service timeout.
    #[error("call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// A subprocess backend failed (bad exit status, missing output).
    #[error("{detail}")]
    Backend { detail: String },

    /// The request was rejected before being sent (input constraint).
    #[error("invalid request: {detail}")]
    InvalidRequest { detail: String },

    /// Local I/O while writing the service's output.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A rendered, silent video clip for one scene.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedClip {
    /// The scene this clip belongs to.
    pub scene_index: usize,
    /// Path of the clip file (MP4, no audio track).
    pub path: PathBuf,
    /// Measured duration of the file, in seconds.
    pub duration_secs: f64,
}

/// A synthesized narration segment for one scene.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    /// The scene this segment belongs to.
    pub scene_index: usize,
    /// Path of the audio file.
    pub path: PathBuf,
    /// Measured duration of the file, in seconds.
    pub duration_secs: f64,
}

/// Summarizes a document into a scene-plan reply.
///
/// The reply is raw text; parsing and validation happen in
/// [`crate::plan::ScenePlan::from_response`] so that a malformed reply and a
/// failed call share one retry policy.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Ask for a plan of `scene_count` scenes covering `target_duration_secs`
    /// of video for the given document text.
    async fn summarize(
        &self,
        document_text: &str,
        scene_count: usize,
        target_duration_secs: f64,
    ) -> Result<String, ServiceError>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

/// Renders one scene's animation directive into a silent clip at `out_path`.
#[async_trait]
pub trait ClipRenderer: Send + Sync {
    async fn render_clip(&self, scene: &Scene, out_path: &Path)
        -> Result<RenderedClip, ServiceError>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

/// Synthesizes narration text into an audio file at `out_path`.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        scene_index: usize,
        text: &str,
        out_path: &Path,
    ) -> Result<AudioSegment, ServiceError>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}
