//! Prompts for LLM-based scene planning.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing planner behaviour (e.g. allowed
//!    Manim objects, clip length guidance) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can import and inspect prompts directly
//!    without spinning up a real LLM, making prompt regressions easy to catch.
//!
//! Callers can override the default via
//! [`crate::config::GenerationConfig::system_prompt`]; the constants here are
//! used only when no override is provided.

/// Default system prompt for planning an educational summary video.
///
/// This prompt is used when `GenerationConfig::system_prompt` is `None`.
///
/// The Manim restrictions are deliberate: generated code that references
/// LaTeX, SVG assets, or external files fails at render time far more often
/// than it succeeds, and a failed clip costs a full render timeout. Keeping
/// the model on plain geometric objects makes the render stage boring and
/// reliable.
pub const PLANNER_SYSTEM_PROMPT: &str = r#"You are an excellent teacher in the style of the best mathematics educators.
From the research paper text you are given, plan an educational summary video as a JSON object containing a list of clips.
Each clip must be of type "manim" with Python code that generates an educational animation using Manim.

CRITICAL REQUIREMENTS:
- Only use basic Manim objects: Circle, Square, Rectangle, Line, Arrow, Dot, Text
- DO NOT use SVGMobject, DecimalNumber, MathTex, Tex, or any LaTeX-dependent objects
- DO NOT reference external files like .svg, .png, .jpg
- Keep animations simple and clean
- Use only built-in Manim colors like RED, BLUE, GREEN, YELLOW, WHITE
- Each clip's code must define exactly one class deriving from Scene
- Focus on key concepts from the paper using simple geometric visualizations
- voice_over is the narration spoken over the clip: plain sentences, no markup

Return ONLY the JSON object of this schema (no other text, no code fences):
{
    "clips": [
        {
            "type": "manim",
            "code": "string",
            "voice_over": "string",
            "duration_secs": number
        }
    ]
}"#;

/// Build the user message carrying the document text and plan shape.
///
/// The scene count and duration constraints live in the user turn rather
/// than the system prompt so a custom system prompt cannot accidentally
/// drop them.
pub fn planner_user_prompt(document_text: &str, scene_count: usize, target_duration_secs: f64) -> String {
    let per_scene = target_duration_secs / scene_count as f64;
    format!(
        "Plan exactly {scene_count} clips for a summary video of about \
         {target_duration_secs:.0} seconds total (roughly {per_scene:.0} seconds \
         of narration per clip). Set each clip's duration_secs accordingly.\n\n\
         Research paper text:\n\n\"\"\"\n{document_text}\n\"\"\""
    )
}
