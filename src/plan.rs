//! Scene plan model and summarizer-reply validation.
//!
//! The summarization service replies with free text that should contain a
//! JSON object of the form:
//!
//! ```json
//! {
//!   "clips": [
//!     { "type": "manim", "code": "...", "voice_over": "...", "duration_secs": 15.0 }
//!   ]
//! }
//! ```
//!
//! LLMs are not reliable JSON printers — replies arrive wrapped in Markdown
//! fences or preceded by commentary often enough that parsing must be
//! defensive. [`ScenePlan::from_response`] therefore extracts the outermost
//! JSON object before deserializing, then validates the result against the
//! configured scene count. Validation is strict: a reply with the wrong
//! number of scenes, an empty narration, or an empty directive is rejected
//! outright rather than patched up, because a silently padded or trimmed
//! plan would no longer match what the model decided the video should say.

use crate::error::Pdf2ReelError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// What the renderer should draw for one scene.
///
/// Currently the only backend is Manim scene source, matching the planner's
/// wire contract. An enum keeps the door open for other directive kinds
/// without touching the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnimationDirective {
    /// Python source defining a single `class X(Scene)` for the Manim CLI.
    Manim { code: String },
}

impl AnimationDirective {
    /// The directive's source code, regardless of kind.
    pub fn code(&self) -> &str {
        match self {
            AnimationDirective::Manim { code } => code,
        }
    }
}

/// One planned unit of narration + visual directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// 0-based position in the final video. Unique and contiguous.
    pub index: usize,
    /// Narration spoken over this scene. Never empty.
    pub narration_text: String,
    /// What to draw.
    pub animation_directive: AnimationDirective,
    /// How long this scene should run, in seconds. Always > 0.
    pub target_duration_secs: f64,
}

/// The ordered, validated set of scenes for one run.
///
/// Immutable after creation: the pipeline only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenePlan {
    scenes: Vec<Scene>,
}

// ── Wire format ──────────────────────────────────────────────────────────

/// Raw reply shape, before validation.
#[derive(Debug, Deserialize)]
struct PlannerReply {
    clips: Vec<PlannedClip>,
}

#[derive(Debug, Deserialize)]
struct PlannedClip {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    voice_over: String,
    #[serde(default)]
    duration_secs: Option<f64>,
}

static JSON_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

/// Locate the outermost JSON object in a possibly-chatty reply.
///
/// Tries the raw text first, then strips Markdown fences, then falls back to
/// a greedy brace match over the whole reply.
fn extract_json(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }
    JSON_OBJECT.find(raw).map(|m| m.as_str())
}

impl ScenePlan {
    /// Parse and validate a summarizer reply into a plan of exactly
    /// `scene_count` scenes whose target durations sum to
    /// `target_duration_secs`.
    ///
    /// Duration policy (deterministic given the same reply): when every clip
    /// carries a positive `duration_secs` the values are treated as weights
    /// and scaled so they sum exactly to the target; otherwise the target is
    /// split evenly.
    pub fn from_response(
        raw: &str,
        scene_count: usize,
        target_duration_secs: f64,
    ) -> Result<ScenePlan, Pdf2ReelError> {
        let json = extract_json(raw).ok_or_else(|| Pdf2ReelError::MalformedPlan {
            reason: "reply contains no JSON object".into(),
        })?;

        let reply: PlannerReply =
            serde_json::from_str(json).map_err(|e| Pdf2ReelError::MalformedPlan {
                reason: format!("JSON does not match the clips schema: {e}"),
            })?;

        if reply.clips.len() != scene_count {
            return Err(Pdf2ReelError::MalformedPlan {
                reason: format!(
                    "expected exactly {} scenes, got {}",
                    scene_count,
                    reply.clips.len()
                ),
            });
        }

        for (i, clip) in reply.clips.iter().enumerate() {
            if clip.kind != "manim" {
                return Err(Pdf2ReelError::MalformedPlan {
                    reason: format!("scene {i}: unknown directive type '{}'", clip.kind),
                });
            }
            if clip.code.trim().is_empty() {
                return Err(Pdf2ReelError::MalformedPlan {
                    reason: format!("scene {i}: empty animation code"),
                });
            }
            if clip.voice_over.trim().is_empty() {
                return Err(Pdf2ReelError::MalformedPlan {
                    reason: format!("scene {i}: empty narration text"),
                });
            }
        }

        let durations = resolve_durations(&reply.clips, target_duration_secs);

        let scenes = reply
            .clips
            .into_iter()
            .zip(durations)
            .enumerate()
            .map(|(index, (clip, target_duration_secs))| Scene {
                index,
                narration_text: clip.voice_over.trim().to_string(),
                animation_directive: AnimationDirective::Manim { code: clip.code },
                target_duration_secs,
            })
            .collect();

        Ok(ScenePlan { scenes })
    }

    /// The scenes, in playback order.
    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Sum of all scene target durations, in seconds.
    pub fn total_target_secs(&self) -> f64 {
        self.scenes.iter().map(|s| s.target_duration_secs).sum()
    }
}

/// Map per-clip durations from the reply onto final per-scene targets.
fn resolve_durations(clips: &[PlannedClip], target_total: f64) -> Vec<f64> {
    let weights: Option<Vec<f64>> = clips
        .iter()
        .map(|c| c.duration_secs.filter(|d| *d > 0.0))
        .collect();

    match weights {
        Some(w) => {
            let sum: f64 = w.iter().sum();
            w.into_iter().map(|d| target_total * d / sum).collect()
        }
        None => {
            let even = target_total / clips.len() as f64;
            vec![even; clips.len()]
        }
    }
}

/// Head-truncate `text` to at most `limit` characters on a char boundary.
///
/// This is the fixed policy for oversized documents: keep the head, drop the
/// tail. The front of a paper is where the summary signal lives.
pub fn truncate_for_prompt(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
