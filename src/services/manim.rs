//! Manim CLI renderer implementing [`ClipRenderer`].
//!
//! The animation directive carries Python source defining one
//! `class X(Scene)`. Rendering shells out to the `manim` binary: the source
//! is written to a scratch file (with the standard imports prepended, since
//! planner output usually omits them), the scene class name is scraped from
//! the code, and the CLI renders into a per-call media directory from which
//! the newest non-partial MP4 is collected. Manim's output layout varies
//! across quality settings and versions, so globbing for the result is more
//! robust than predicting the path.
//!
//! ## Duration adjustment
//!
//! Planner-generated animations rarely land exactly on their target
//! duration. The fixed policy: a clip shorter than `target − tolerance` is
//! freeze-padded (last frame cloned) up to the target; longer clips are left
//! untouched and reconciled against the narration at assembly. No
//! speed-warping — it would distort the animation timing the planner chose.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ClipRenderer, RenderedClip, ServiceError};
use crate::pipeline::ffmpeg;
use crate::plan::Scene;

const MANIM_PRELUDE: &str = "from manim import *\nimport numpy as np\n\n";

static SCENE_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"class\s+([A-Za-z_]\w*)\s*\(\s*Scene\s*\)").expect("valid regex"));

/// Renderer that drives the `manim` command-line tool.
pub struct ManimRenderer {
    width: u32,
    height: u32,
    fps: u32,
    tolerance_secs: f64,
    timeout_secs: u64,
}

impl ManimRenderer {
    pub fn new(width: u32, height: u32, fps: u32, tolerance_secs: f64, timeout_secs: u64) -> Self {
        Self {
            width,
            height,
            fps,
            tolerance_secs,
            timeout_secs,
        }
    }

    /// Whether the `manim` binary is reachable on PATH.
    pub fn is_available() -> bool {
        std::process::Command::new("manim")
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

/// Scrape the `class X(Scene)` name out of directive code.
pub fn scene_class_name(code: &str) -> Option<&str> {
    SCENE_CLASS
        .captures(code)
        .map(|c| c.get(1).expect("group 1").as_str())
}

/// Prepend the standard imports unless the code already has them.
fn with_prelude(code: &str) -> String {
    if code.contains("from manim import") {
        code.to_string()
    } else {
        format!("{MANIM_PRELUDE}{code}")
    }
}

/// Newest `.mp4` under `dir`, skipping Manim's `partial_movie_files`.
fn find_newest_mp4(dir: &Path) -> Option<PathBuf> {
    fn walk(dir: &Path, newest: &mut Option<(SystemTime, PathBuf)>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, newest);
            } else if path.extension().is_some_and(|e| e == "mp4")
                && !path.to_string_lossy().contains("partial")
            {
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
                    *newest = Some((modified, path));
                }
            }
        }
    }

    let mut newest = None;
    walk(dir, &mut newest);
    newest.map(|(_, path)| path)
}

#[async_trait]
impl ClipRenderer for ManimRenderer {
    async fn render_clip(
        &self,
        scene: &Scene,
        out_path: &Path,
    ) -> Result<RenderedClip, ServiceError> {
        let code = with_prelude(scene.animation_directive.code());
        let class_name = scene_class_name(&code)
            .ok_or_else(|| ServiceError::InvalidRequest {
                detail: format!(
                    "scene {}: directive defines no `class X(Scene)`",
                    scene.index
                ),
            })?
            .to_string();

        let media_dir = TempDir::new()?;
        let script_path = media_dir.path().join(format!("scene_{}.py", scene.index));
        tokio::fs::write(&script_path, &code).await?;

        debug!(
            "scene {}: rendering class {} via manim",
            scene.index, class_name
        );

        let mut cmd = Command::new("manim");
        cmd.arg(&script_path)
            .arg(&class_name)
            .arg("--media_dir")
            .arg(media_dir.path())
            .args([
                "-v",
                "WARNING",
                "-qm",
                "--resolution",
                &format!("{},{}", self.width, self.height),
                "--frame_rate",
                &self.fps.to_string(),
            ]);

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| ServiceError::Timeout {
                secs: self.timeout_secs,
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServiceError::Backend {
                detail: format!(
                    "manim exited with {}: {}",
                    output.status,
                    stderr.trim().chars().take(500).collect::<String>()
                ),
            });
        }

        let produced =
            find_newest_mp4(media_dir.path()).ok_or_else(|| ServiceError::Backend {
                detail: format!("scene {}: manim produced no MP4 output", scene.index),
            })?;

        // TempDir and out_path can live on different filesystems; fall back
        // to copy when rename fails.
        if tokio::fs::rename(&produced, out_path).await.is_err() {
            tokio::fs::copy(&produced, out_path).await?;
        }

        let mut duration_secs = ffmpeg::probe_duration(out_path).await?;
        let shortfall = scene.target_duration_secs - duration_secs;
        if shortfall > self.tolerance_secs {
            warn!(
                "scene {}: clip is {:.2}s short of its {:.2}s target — freeze-padding",
                scene.index, shortfall, scene.target_duration_secs
            );
            let raw_path = out_path.with_extension("raw.mp4");
            tokio::fs::rename(out_path, &raw_path).await?;
            ffmpeg::freeze_pad(&raw_path, out_path, shortfall, self.fps).await?;
            tokio::fs::remove_file(&raw_path).await.ok();
            duration_secs = ffmpeg::probe_duration(out_path).await?;
        }

        Ok(RenderedClip {
            scene_index: scene.index,
            path: out_path.to_path_buf(),
            duration_secs,
        })
    }

    fn name(&self) -> &str {
        "manim"
    }
}
