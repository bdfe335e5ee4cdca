//! Progress-callback trait for per-scene pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline works through the scenes.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a Tokio broadcast channel, a WebSocket, a database record,
//! or a terminal progress bar — without the library knowing anything about how
//! the host application communicates. The trait is `Send + Sync` so it works
//! correctly when scenes are processed concurrently.

use std::sync::Arc;

/// Called by the pipeline as it plans, renders, and assembles.
///
/// Implementations must be `Send + Sync` (scenes are processed
/// concurrently). All methods have default no-op implementations so callers
/// only override what they care about.
///
/// # Thread safety
///
/// `on_scene_start`, `on_scene_complete`, and `on_scene_error` may be called
/// concurrently from different tasks. Implementations must protect shared
/// mutable state with appropriate synchronisation primitives (e.g. `Mutex`,
/// `AtomicUsize`).
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once after planning, before any scene work starts.
    ///
    /// # Arguments
    /// * `scene_count` — number of scenes that will be processed
    fn on_plan_ready(&self, scene_count: usize) {
        let _ = scene_count;
    }

    /// Called just before a scene's render/synthesis begins.
    ///
    /// # Arguments
    /// * `scene`       — 0-based scene index
    /// * `scene_count` — total scenes in the plan
    fn on_scene_start(&self, scene: usize, scene_count: usize) {
        let _ = (scene, scene_count);
    }

    /// Called when a scene's clip and audio are both ready.
    ///
    /// # Arguments
    /// * `scene`       — 0-based scene index
    /// * `scene_count` — total scenes
    /// * `degraded`    — true when a placeholder was substituted
    fn on_scene_complete(&self, scene: usize, scene_count: usize, degraded: bool) {
        let _ = (scene, scene_count, degraded);
    }

    /// Called when a scene fails fatally (abort-on-failure mode).
    ///
    /// # Arguments
    /// * `scene`       — 0-based scene index
    /// * `scene_count` — total scenes
    /// * `error`       — human-readable error description
    fn on_scene_error(&self, scene: usize, scene_count: usize, error: String) {
        let _ = (scene, scene_count, error);
    }

    /// Called once when all scenes are collected and assembly begins.
    fn on_assembly_start(&self, scene_count: usize) {
        let _ = scene_count;
    }

    /// Called once after the final file is written.
    ///
    /// # Arguments
    /// * `scene_count`    — total scenes
    /// * `degraded_count` — scenes that got a placeholder substitute
    fn on_run_complete(&self, scene_count: usize, degraded_count: usize) {
        let _ = (scene_count, degraded_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
