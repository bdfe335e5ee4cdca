//! Deterministic fakes for every service capability.
//!
//! The orchestration layer is where the bugs live — ordering, pairing,
//! retry, degrade policy — and none of that needs a real LLM, a Manim
//! install, or a speech API to exercise. These mocks simulate the behaviors
//! the pipeline must survive:
//!
//! - `working()` — always succeeds with well-formed output
//! - `failing()` — always errors
//! - `flaky(n)`  — fails the first `n` calls, then succeeds (retry paths)
//! - summarizer-specific: wrong scene count, non-JSON replies
//!
//! They are ordinary public types (not `#[cfg(test)]`) so integration tests
//! and downstream users can drive the pipeline without live credentials.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{AudioSegment, ClipRenderer, RenderedClip, ServiceError, SpeechSynthesizer, Summarizer};
use crate::plan::Scene;

/// Shared failure scheduling for all mock services.
#[derive(Debug, Clone, Copy, PartialEq)]
enum MockBehavior {
    /// Every call succeeds.
    Working,
    /// Every call fails.
    Failing,
    /// The first `n` calls fail, the rest succeed.
    Flaky { fail_first: usize },
}

impl MockBehavior {
    fn should_fail(&self, call_index: usize) -> bool {
        match self {
            MockBehavior::Working => false,
            MockBehavior::Failing => true,
            MockBehavior::Flaky { fail_first } => call_index < *fail_first,
        }
    }
}

/// Build a well-formed planner reply for `scene_count` scenes.
pub fn canned_reply(scene_count: usize) -> String {
    let clips: Vec<String> = (0..scene_count)
        .map(|i| {
            format!(
                r#"{{"type":"manim","code":"class Mock{i}(Scene):\n    def construct(self):\n        self.wait(1)","voice_over":"Mock narration for scene {i}.","duration_secs":15}}"#
            )
        })
        .collect();
    format!(r#"{{"clips":[{}]}}"#, clips.join(","))
}

// ── Summarizer ───────────────────────────────────────────────────────────

/// What the mock summarizer replies with on a successful call.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ReplyShape {
    /// A valid plan matching the requested scene count.
    Valid,
    /// A valid-looking plan with one scene too few.
    ShortByOne,
    /// A reply with no JSON in it at all.
    NotJson,
}

/// Mock [`Summarizer`] with scriptable failure and reply shapes.
pub struct MockSummarizer {
    behavior: MockBehavior,
    reply: ReplyShape,
    calls: Arc<AtomicUsize>,
}

impl MockSummarizer {
    fn new(behavior: MockBehavior, reply: ReplyShape) -> Self {
        Self {
            behavior,
            reply,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always returns a valid plan.
    pub fn working() -> Self {
        Self::new(MockBehavior::Working, ReplyShape::Valid)
    }

    /// Always fails at the transport level.
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing, ReplyShape::Valid)
    }

    /// Fails the first `n` calls, then returns a valid plan.
    pub fn flaky(n: usize) -> Self {
        Self::new(MockBehavior::Flaky { fail_first: n }, ReplyShape::Valid)
    }

    /// Succeeds, but with one scene fewer than requested.
    pub fn short_by_one() -> Self {
        Self::new(MockBehavior::Working, ReplyShape::ShortByOne)
    }

    /// Succeeds, but the reply contains no JSON.
    pub fn not_json() -> Self {
        Self::new(MockBehavior::Working, ReplyShape::NotJson)
    }

    /// How many times `summarize` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Handle for asserting call counts after the mock moved into an `Arc`.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(
        &self,
        _document_text: &str,
        scene_count: usize,
        _target_duration_secs: f64,
    ) -> Result<String, ServiceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.behavior.should_fail(call) {
            return Err(ServiceError::Http {
                status: 529,
                body: "mock overloaded".into(),
            });
        }
        Ok(match self.reply {
            ReplyShape::Valid => canned_reply(scene_count),
            ReplyShape::ShortByOne => canned_reply(scene_count.saturating_sub(1)),
            ReplyShape::NotJson => "I'm sorry, I can't produce a plan for that.".into(),
        })
    }

    fn name(&self) -> &str {
        "mock-summarizer"
    }
}

// ── Clip renderer ────────────────────────────────────────────────────────

/// Mock [`ClipRenderer`] that writes a stub file and claims a duration.
pub struct MockRenderer {
    behavior: MockBehavior,
    /// Claimed clip duration; `None` means "exactly the scene target".
    duration_secs: Option<f64>,
    calls: Arc<AtomicUsize>,
}

impl MockRenderer {
    fn new(behavior: MockBehavior, duration_secs: Option<f64>) -> Self {
        Self {
            behavior,
            duration_secs,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Renders every scene at exactly its target duration.
    pub fn working() -> Self {
        Self::new(MockBehavior::Working, None)
    }

    /// Renders every scene at a fixed duration (to exercise reconciliation).
    pub fn with_duration(duration_secs: f64) -> Self {
        Self::new(MockBehavior::Working, Some(duration_secs))
    }

    /// Every render fails.
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing, None)
    }

    /// Fails the first `n` renders, then succeeds.
    pub fn flaky(n: usize) -> Self {
        Self::new(MockBehavior::Flaky { fail_first: n }, None)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ClipRenderer for MockRenderer {
    async fn render_clip(
        &self,
        scene: &Scene,
        out_path: &Path,
    ) -> Result<RenderedClip, ServiceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.behavior.should_fail(call) {
            return Err(ServiceError::Backend {
                detail: "mock render failure".into(),
            });
        }
        tokio::fs::write(out_path, b"mock clip").await?;
        Ok(RenderedClip {
            scene_index: scene.index,
            path: out_path.to_path_buf(),
            duration_secs: self.duration_secs.unwrap_or(scene.target_duration_secs),
        })
    }

    fn name(&self) -> &str {
        "mock-renderer"
    }
}

// ── Speech synthesizer ───────────────────────────────────────────────────

/// Mock [`SpeechSynthesizer`] that writes a stub file and claims a duration.
pub struct MockSynthesizer {
    behavior: MockBehavior,
    /// Claimed audio duration; `None` derives one from the text length.
    duration_secs: Option<f64>,
    calls: Arc<AtomicUsize>,
}

impl MockSynthesizer {
    fn new(behavior: MockBehavior, duration_secs: Option<f64>) -> Self {
        Self {
            behavior,
            duration_secs,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Succeeds with a duration derived from the narration length
    /// (~15 characters per second of speech).
    pub fn working() -> Self {
        Self::new(MockBehavior::Working, None)
    }

    /// Succeeds with a fixed duration (to exercise reconciliation).
    pub fn with_duration(duration_secs: f64) -> Self {
        Self::new(MockBehavior::Working, Some(duration_secs))
    }

    /// Every synthesis fails.
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing, None)
    }

    /// Fails the first `n` calls, then succeeds.
    pub fn flaky(n: usize) -> Self {
        Self::new(MockBehavior::Flaky { fail_first: n }, None)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(
        &self,
        scene_index: usize,
        text: &str,
        out_path: &Path,
    ) -> Result<AudioSegment, ServiceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.behavior.should_fail(call) {
            return Err(ServiceError::Http {
                status: 503,
                body: "mock synthesis failure".into(),
            });
        }
        if text.trim().is_empty() {
            return Err(ServiceError::InvalidRequest {
                detail: "empty narration".into(),
            });
        }
        tokio::fs::write(out_path, b"mock audio").await?;
        Ok(AudioSegment {
            scene_index,
            path: out_path.to_path_buf(),
            duration_secs: self
                .duration_secs
                .unwrap_or_else(|| (text.chars().count() as f64 / 15.0).max(0.5)),
        })
    }

    fn name(&self) -> &str {
        "mock-synthesizer"
    }
}
