//! # pdf2reel
//!
//! Turn a PDF paper into a one-minute narrated summary video.
//!
//! ## Why this crate?
//!
//! Reading a paper takes an hour; watching a good one-minute summary takes a
//! minute. This crate wires four external capabilities into one pipeline: an
//! LLM plans the video as narrated scenes, Manim renders each scene's
//! animation, a speech API narrates it, and ffmpeg stitches the result into
//! a single MP4. There is no clever algorithm here on purpose — the value is
//! a sequencing layer that is strict about ordering, duration reconciliation,
//! and failure policy.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Fetch     resolve local file or download from URL, extract text
//!  ├─ 2. Plan      LLM → N scenes {narration, animation code, duration}
//!  ├─ 3. Scenes    per scene, concurrently: render clip ∥ synthesize audio
//!  ├─ 4. Assemble  pair by scene index, pad shorter stream, concat, mux
//!  └─ 5. Output    one H.264/AAC MP4 + per-scene reports
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2reel::{generate, GenerationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Services auto-detected from ANTHROPIC_API_KEY / OPENAI_API_KEY;
//!     // `manim` and `ffmpeg` must be on PATH.
//!     let config = GenerationConfig::default();
//!     let output = generate("https://example.com/paper.pdf", "summary_video.mp4", &config).await?;
//!     println!("{} ({:.1}s)", output.video.path.display(), output.video.duration_secs);
//!     if output.is_degraded() {
//!         eprintln!("note: {} scenes carry placeholders", output.stats.degraded_scenes);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! | Stage | On failure |
//! |-------|-----------|
//! | Fetch | fatal, single attempt — no document, no run |
//! | Plan  | one retry with backoff, then fatal |
//! | Scene | one retry, then a placeholder (blank clip / silence) — or fatal with `abort_on_scene_failure` |
//! | Assemble | always fatal; missing pairs and encode errors abort the run |
//!
//! No partial video is ever written: the output file appears atomically on
//! success only.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2reel` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdf2reel = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod plan;
pub mod progress;
pub mod prompts;
pub mod services;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GenerationConfig, GenerationConfigBuilder};
pub use error::{Pdf2ReelError, SceneError};
pub use generate::{generate, generate_sync, plan as plan_scenes};
pub use output::{FinalVideo, GenerationOutput, GenerationStats, SceneReport};
pub use plan::{AnimationDirective, Scene, ScenePlan};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use services::{AudioSegment, ClipRenderer, RenderedClip, SpeechSynthesizer, Summarizer};
