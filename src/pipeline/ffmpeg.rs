//! Thin wrappers around the system `ffmpeg`/`ffprobe` binaries.
//!
//! We intentionally shell out to the system binaries rather than linking an
//! FFmpeg binding crate: it avoids native dev header/lib requirements, and
//! every operation this pipeline needs (probe, pad, placeholder synthesis,
//! concat, mux) is a single short command line. All invocations run through
//! [`run`], which captures stderr so a failed encode surfaces the actual
//! encoder message instead of a bare exit code.
//!
//! Everything here is policy-free: callers decide durations and pad amounts,
//! this module only executes them.

use crate::error::Pdf2ReelError;
use crate::services::ServiceError;
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Sample rate used for generated silence. Matches common TTS output so
/// concatenated audio streams share one rate.
const SILENCE_SAMPLE_RATE: u32 = 24_000;

/// Check whether a binary is reachable on PATH.
pub fn is_on_path(binary: &str) -> bool {
    std::process::Command::new(binary)
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Fail fast if ffmpeg/ffprobe are missing, before any work is attempted.
pub fn ensure_available() -> Result<(), Pdf2ReelError> {
    for binary in ["ffmpeg", "ffprobe"] {
        if !is_on_path(binary) {
            return Err(Pdf2ReelError::FfmpegNotFound { binary });
        }
    }
    Ok(())
}

/// Run an ffmpeg command, mapping failure to the captured stderr.
async fn run(args: &[&str]) -> Result<(), ServiceError> {
    debug!("ffmpeg {}", args.join(" "));
    let output = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error"])
        .args(args)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ServiceError::Backend {
            detail: format!("ffmpeg exited with {}: {}", output.status, stderr.trim()),
        });
    }
    Ok(())
}

// ── Probing ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: String,
}

/// Measure a media file's duration in seconds via ffprobe.
pub async fn probe_duration(path: &Path) -> Result<f64, ServiceError> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
        .arg(path)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ServiceError::Backend {
            detail: format!("ffprobe exited with {}: {}", output.status, stderr.trim()),
        });
    }

    let probed: ProbeOutput =
        serde_json::from_slice(&output.stdout).map_err(|e| ServiceError::Backend {
            detail: format!("unparseable ffprobe output: {e}"),
        })?;

    probed
        .format
        .duration
        .parse::<f64>()
        .map_err(|e| ServiceError::Backend {
            detail: format!("unparseable duration '{}': {e}", probed.format.duration),
        })
}

// ── Placeholders ─────────────────────────────────────────────────────────

/// Synthesize a blank (black) silent clip of the given duration.
///
/// Used as the degraded substitute when a scene's render fails for good.
pub async fn blank_clip(
    path: &Path,
    width: u32,
    height: u32,
    fps: u32,
    duration_secs: f64,
) -> Result<(), ServiceError> {
    let source = format!("color=c=black:s={width}x{height}:r={fps}:d={duration_secs:.3}");
    run(&[
        "-f",
        "lavfi",
        "-i",
        &source,
        "-c:v",
        "libx264",
        "-pix_fmt",
        "yuv420p",
        "-movflags",
        "+faststart",
        path.to_str().unwrap_or_default(),
    ])
    .await
}

/// Synthesize a silent audio file of the given duration.
///
/// Used as the degraded substitute when a scene's narration fails for good.
pub async fn silence(path: &Path, duration_secs: f64) -> Result<(), ServiceError> {
    let source = format!("anullsrc=r={SILENCE_SAMPLE_RATE}:cl=mono");
    run(&[
        "-f",
        "lavfi",
        "-i",
        &source,
        "-t",
        &format!("{duration_secs:.3}"),
        path.to_str().unwrap_or_default(),
    ])
    .await
}

// ── Duration adjustment ──────────────────────────────────────────────────

/// Extend a clip by freezing its last frame for `pad_secs` seconds.
pub async fn freeze_pad(
    input: &Path,
    output: &Path,
    pad_secs: f64,
    fps: u32,
) -> Result<(), ServiceError> {
    let filter = format!("tpad=stop_mode=clone:stop_duration={pad_secs:.3}");
    run(&[
        "-i",
        input.to_str().unwrap_or_default(),
        "-vf",
        &filter,
        "-r",
        &fps.to_string(),
        "-c:v",
        "libx264",
        "-pix_fmt",
        "yuv420p",
        "-an",
        output.to_str().unwrap_or_default(),
    ])
    .await
}

// ── Assembly ─────────────────────────────────────────────────────────────

/// Mux one clip/audio pair into a segment of exactly `resolved_secs`.
///
/// The video track is freeze-extended (`tpad` cloning the last frame) and
/// the audio track silence-extended (`apad`) without bound; `-t` then cuts
/// both at the resolved duration. Whichever stream was shorter ends up
/// padded, and neither is ever truncated below its own length because
/// `resolved_secs` is the max of the two.
pub async fn encode_segment(
    clip: &Path,
    audio: &Path,
    output: &Path,
    resolved_secs: f64,
    fps: u32,
) -> Result<(), ServiceError> {
    run(&[
        "-i",
        clip.to_str().unwrap_or_default(),
        "-i",
        audio.to_str().unwrap_or_default(),
        "-vf",
        "tpad=stop_mode=clone:stop=-1",
        "-af",
        "apad",
        "-t",
        &format!("{resolved_secs:.3}"),
        "-r",
        &fps.to_string(),
        "-c:v",
        "libx264",
        "-pix_fmt",
        "yuv420p",
        "-c:a",
        "aac",
        "-movflags",
        "+faststart",
        output.to_str().unwrap_or_default(),
    ])
    .await
}

/// Render the concat-demuxer list file content for `paths`.
///
/// Single quotes inside paths are escaped the way the demuxer expects
/// (`'` → `'\''`).
pub fn concat_list(paths: &[&Path]) -> String {
    let mut list = String::new();
    for path in paths {
        let escaped = path.to_string_lossy().replace('\'', "'\\''");
        list.push_str(&format!("file '{escaped}'\n"));
    }
    list
}

/// Concatenate pre-encoded segments by stream copy.
///
/// All segments share codec parameters (they come out of
/// [`encode_segment`]), so `-c copy` is safe and fast. The output format is
/// forced to mp4 because the caller writes to a `.tmp`-suffixed path that
/// ffmpeg could not infer a container from.
pub async fn concat_segments(list_path: &Path, output: &Path) -> Result<(), ServiceError> {
    run(&[
        "-f",
        "concat",
        "-safe",
        "0",
        "-i",
        list_path.to_str().unwrap_or_default(),
        "-c",
        "copy",
        "-movflags",
        "+faststart",
        "-f",
        "mp4",
        output.to_str().unwrap_or_default(),
    ])
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn concat_list_formats_one_line_per_file() {
        let a = PathBuf::from("/tmp/seg_0.mp4");
        let b = PathBuf::from("/tmp/seg_1.mp4");
        let list = concat_list(&[a.as_path(), b.as_path()]);
        assert_eq!(list, "file '/tmp/seg_0.mp4'\nfile '/tmp/seg_1.mp4'\n");
    }

    #[test]
    fn concat_list_escapes_single_quotes() {
        let p = PathBuf::from("/tmp/it's here.mp4");
        let list = concat_list(&[p.as_path()]);
        assert!(list.contains(r"it'\''s here"), "got: {list}");
    }

    #[test]
    fn probe_output_parses_ffprobe_json() {
        let json = r#"{"format":{"duration":"12.345000"}}"#;
        let probed: ProbeOutput = serde_json::from_str(json).unwrap();
        assert_eq!(probed.format.duration, "12.345000");
        assert!((probed.format.duration.parse::<f64>().unwrap() - 12.345).abs() < 1e-9);
    }
}
