//! Scene planning: drive the summarizer and validate its reply.
//!
//! ## Retry Strategy
//!
//! The summarization call is treated as non-deterministic and flaky: HTTP
//! 5xx/529 under load, and occasionally a reply that fails validation.
//! Both failure kinds share one bounded retry with exponential backoff
//! (`retry_backoff_ms * 2^attempt`) — a malformed reply is just as
//! transient as a 503, since the next sample from the model usually parses.
//! After the retry budget the failure is fatal: the pipeline has nothing to
//! render without a plan.

use crate::config::GenerationConfig;
use crate::error::Pdf2ReelError;
use crate::plan::{truncate_for_prompt, ScenePlan};
use crate::services::Summarizer;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Ask the summarizer for a validated [`ScenePlan`].
///
/// The document text is head-truncated to `config.truncation_limit`
/// characters before submission (the fixed oversize policy). Exactly
/// `config.scene_count` scenes come back or the run fails.
pub async fn build_plan(
    summarizer: &Arc<dyn Summarizer>,
    document_text: &str,
    config: &GenerationConfig,
) -> Result<ScenePlan, Pdf2ReelError> {
    let text = truncate_for_prompt(document_text, config.truncation_limit);
    if text.len() < document_text.len() {
        info!(
            "Document truncated from {} to {} chars for summarization",
            document_text.chars().count(),
            text.chars().count()
        );
    }

    let mut last_err: Option<Pdf2ReelError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Planning retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match summarizer
            .summarize(text, config.scene_count, config.target_duration_secs)
            .await
        {
            Ok(reply) => {
                match ScenePlan::from_response(&reply, config.scene_count, config.target_duration_secs)
                {
                    Ok(plan) => {
                        debug!(
                            "Planned {} scenes totalling {:.1}s",
                            plan.len(),
                            plan.total_target_secs()
                        );
                        return Ok(plan);
                    }
                    Err(e) => {
                        warn!("Planner reply rejected on attempt {}: {}", attempt + 1, e);
                        last_err = Some(e);
                    }
                }
            }
            Err(e) => {
                warn!("Planner call failed on attempt {}: {}", attempt + 1, e);
                last_err = Some(Pdf2ReelError::SummarizationFailed {
                    attempts: attempt + 1,
                    detail: e.to_string(),
                });
            }
        }
    }

    // Prefer the validation error when the last attempt parsed but failed
    // validation — it tells the user what the model actually got wrong.
    Err(match last_err {
        Some(e @ Pdf2ReelError::MalformedPlan { .. }) => e,
        Some(Pdf2ReelError::SummarizationFailed { detail, .. }) => {
            Pdf2ReelError::SummarizationFailed {
                attempts: config.max_retries + 1,
                detail,
            }
        }
        Some(other) => other,
        None => Pdf2ReelError::Internal("planning loop ran zero attempts".into()),
    })
}
