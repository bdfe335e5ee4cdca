//! CLI binary for pdf2reel.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `GenerationConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2reel::{
    generate, plan_scenes, GenerationConfig, PipelineProgressCallback, ProgressCallback,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-scene log
/// lines using [indicatif]. Designed to work correctly when scenes complete
/// out-of-order (concurrent fan-out).
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Per-scene wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Count of scenes that were substituted with placeholders.
    degraded: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically by
    /// `on_plan_ready` (planning happens before any scene is processed).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_plan_ready

        // Initial style: spinner only (no counter until the plan exists).
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Planning");
        bar.set_message("Summarizing the paper…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            degraded: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once we know the scene count.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>2}/{len} scenes  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_plan_ready(&self, scene_count: usize) {
        self.activate_bar(scene_count);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Plan ready: {scene_count} scenes"))
        ));
    }

    fn on_scene_start(&self, scene: usize, _scene_count: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(scene, Instant::now());
        self.bar.set_message(format!("scene {scene}"));
    }

    fn on_scene_complete(&self, scene: usize, scene_count: usize, degraded: bool) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&scene)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        if degraded {
            self.degraded.fetch_add(1, Ordering::SeqCst);
        }

        let mark = if degraded { yellow("⚠") } else { green("✓") };
        let note = if degraded { yellow("placeholder") } else { dim("clip+audio") };
        self.bar.println(format!(
            "  {} Scene {:>2}/{:<2}  {}  {}",
            mark,
            scene + 1,
            scene_count,
            note,
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_scene_error(&self, scene: usize, scene_count: usize, error: String) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&scene)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error
        };

        self.bar.println(format!(
            "  {} Scene {:>2}/{:<2}  {}  {}",
            red("✗"),
            scene + 1,
            scene_count,
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_assembly_start(&self, _scene_count: usize) {
        self.bar.set_prefix("Assembling");
        self.bar.set_message("encoding and muxing…");
    }

    fn on_run_complete(&self, scene_count: usize, degraded_count: usize) {
        self.bar.finish_and_clear();

        if degraded_count == 0 {
            eprintln!(
                "{} {} scenes rendered and narrated",
                green("✔"),
                bold(&scene_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} scenes complete  ({} with placeholders)",
                cyan("⚠"),
                bold(&(scene_count - degraded_count).to_string()),
                scene_count,
                yellow(&degraded_count.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One-minute summary of an arXiv paper
  pdf2reel https://arxiv.org/pdf/1706.03762 -o attention.mp4

  # Local file, six 10-second scenes
  pdf2reel paper.pdf --scenes 6 --duration 60

  # Preview what the video would say, without rendering anything
  pdf2reel paper.pdf --plan-only

  # Strict mode: any backend failure aborts the run
  pdf2reel paper.pdf --abort-on-scene-failure

  # Structured report on stdout
  pdf2reel paper.pdf --json -o out.mp4

REQUIRED TOOLING:
  ffmpeg / ffprobe   on PATH (assembly, probing, placeholders)
  manim              on PATH (scene rendering; not needed for --plan-only)

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY   Summarization (scene planning)
  OPENAI_API_KEY      Narration synthesis
  PDF2REEL_*          Every flag has an env twin, e.g. PDF2REEL_SCENES

FAILURE POLICY:
  Planning gets one automatic retry, then the run aborts.
  A failed scene render/synthesis gets one retry, then a placeholder
  (blank clip / silence) is substituted and reported — unless
  --abort-on-scene-failure is set. Missing scene data or an encode
  failure at assembly always aborts, and no partial video is written.
"#;

/// Turn a PDF paper into a narrated summary video.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2reel",
    version,
    about = "Turn a PDF paper into a one-minute narrated summary video",
    long_about = "Generate a short narrated summary video from a PDF (local file or URL): \
an LLM plans the scenes, Manim renders the animations, a speech API narrates them, \
and ffmpeg muxes everything into one H.264/AAC MP4.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the video to this path.
    #[arg(short, long, env = "PDF2REEL_OUTPUT", default_value = "summary_video.mp4")]
    output: PathBuf,

    /// Number of scenes (clips) in the video.
    #[arg(long, env = "PDF2REEL_SCENES", default_value_t = 4)]
    scenes: usize,

    /// Target total video length in seconds.
    #[arg(long, env = "PDF2REEL_DURATION", default_value_t = 60.0)]
    duration: f64,

    /// Per-clip duration tolerance in seconds.
    #[arg(long, env = "PDF2REEL_TOLERANCE", default_value_t = 0.5)]
    tolerance: f64,

    /// Number of scenes processed concurrently.
    #[arg(short, long, env = "PDF2REEL_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Summarization model ID (e.g. claude-3-5-sonnet-20241022).
    #[arg(long, env = "PDF2REEL_MODEL")]
    model: Option<String>,

    /// Narration voice.
    #[arg(long, env = "PDF2REEL_VOICE", default_value = "alloy")]
    voice: String,

    /// Max characters of document text sent to the summarizer.
    #[arg(long, env = "PDF2REEL_TRUNCATION_LIMIT", default_value_t = 60_000)]
    truncation_limit: usize,

    /// Retries per external call on failure.
    #[arg(long, env = "PDF2REEL_MAX_RETRIES", default_value_t = 1)]
    max_retries: u32,

    /// Abort the whole run on any scene failure (no placeholders).
    #[arg(long, env = "PDF2REEL_ABORT_ON_SCENE_FAILURE")]
    abort_on_scene_failure: bool,

    /// Keep the scratch directory (clips, audio, segments) after the run.
    #[arg(long, env = "PDF2REEL_KEEP_SCRATCH")]
    keep_scratch: bool,

    /// Path to a text file containing a custom planner system prompt.
    #[arg(long, env = "PDF2REEL_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Print the validated scene plan as JSON and exit (no rendering).
    #[arg(long)]
    plan_only: bool,

    /// Output a structured JSON report instead of the summary lines.
    #[arg(long, env = "PDF2REEL_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PDF2REEL_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2REEL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2REEL_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2REEL_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-API-call timeout in seconds (summarization, speech).
    #[arg(long, env = "PDF2REEL_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Per-clip render timeout in seconds.
    #[arg(long, env = "PDF2REEL_RENDER_TIMEOUT", default_value_t = 300)]
    render_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.plan_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Plan-only mode ───────────────────────────────────────────────────
    if cli.plan_only {
        let config = build_config(&cli, None).await?;
        let plan = plan_scenes(&cli.input, &config)
            .await
            .context("Planning failed")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&plan).context("Failed to serialise plan")?
        );
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    // The progress bar starts as a planning spinner; `on_plan_ready` resizes
    // it to the scene count once the plan exists.
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run generation ───────────────────────────────────────────────────
    let output = generate(&cli.input, &cli.output, &config)
        .await
        .context("Generation failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {} scenes  {:.1}s  {}ms  →  {}",
            if output.stats.degraded_scenes == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            output.stats.scene_count,
            output.video.duration_secs,
            output.stats.total_duration_ms,
            bold(&output.video.path.display().to_string()),
        );
        for scene in output.scenes.iter().filter(|s| s.is_degraded()) {
            for error in &scene.errors {
                eprintln!("   {} {}", yellow("degraded:"), dim(&error.to_string()));
            }
        }
    }

    Ok(())
}

/// Map CLI args to `GenerationConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = GenerationConfig::builder()
        .scene_count(cli.scenes)
        .target_duration_secs(cli.duration)
        .duration_tolerance_secs(cli.tolerance)
        .concurrency(cli.concurrency)
        .voice(cli.voice.clone())
        .truncation_limit(cli.truncation_limit)
        .max_retries(cli.max_retries)
        .abort_on_scene_failure(cli.abort_on_scene_failure)
        .keep_scratch(cli.keep_scratch)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout)
        .render_timeout_secs(cli.render_timeout);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let mut config = builder.build().context("Invalid configuration")?;

    // Apply fields the builder doesn't have setters for on this path.
    config.model = cli.model.clone();
    config.system_prompt = system_prompt;

    Ok(config)
}
