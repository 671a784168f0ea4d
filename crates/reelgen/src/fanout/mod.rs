//! Per-segment image generation with bounded parallelism.
//!
//! Every transcript segment becomes one task that synthesizes a prompt and
//! then renders an image, each phase retried on its own schedule. At most
//! `max_concurrent` tasks hold an admission permit at once. The scheduler
//! waits for every task before returning; one segment failing never stops
//! another, and images already written stay on disk.

pub mod retry;
pub mod segment;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::collaborators::{ImageGenerator, ImagePromptGenerator, PromptContext};
use crate::config::FanoutConfig;
use crate::job::Transcript;
use crate::storage::JobWorkspace;

pub use retry::{RetryExhausted, RetrySchedule};
pub use segment::{SegmentFailure, SegmentPhase, SegmentState};

#[derive(Error, Debug)]
pub enum FanoutError {
    #[error("transcript has no segments")]
    NoSegments,

    #[error("errors occurred during image generation: {}", join_failures(.0))]
    Segments(Vec<SegmentFailure>),

    #[error("image generation cancelled")]
    Cancelled,
}

impl FanoutError {
    /// Indices of the segments that failed permanently.
    pub fn failed_indices(&self) -> Vec<usize> {
        match self {
            FanoutError::Segments(failures) => failures.iter().map(|f| f.index).collect(),
            _ => Vec::new(),
        }
    }
}

fn join_failures(failures: &[SegmentFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone)]
pub struct FanoutSettings {
    pub max_concurrent: usize,
    pub retry: RetrySchedule,
    /// Bound on each prompt or image call.
    pub call_timeout: Duration,
}

impl FanoutSettings {
    pub fn from_config(config: &FanoutConfig, call_timeout: Duration) -> Self {
        Self {
            max_concurrent: config.max_concurrent_segments.max(1),
            retry: RetrySchedule::from_config(&config.retry),
            call_timeout,
        }
    }
}

/// Images written by a successful fan-out, in segment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub images: Vec<PathBuf>,
}

pub struct SegmentFanout {
    prompts: Arc<dyn ImagePromptGenerator>,
    images: Arc<dyn ImageGenerator>,
    settings: FanoutSettings,
}

impl SegmentFanout {
    pub fn new(
        prompts: Arc<dyn ImagePromptGenerator>,
        images: Arc<dyn ImageGenerator>,
        settings: FanoutSettings,
    ) -> Self {
        Self {
            prompts,
            images,
            settings,
        }
    }

    /// Writes `images/image_<n>.png` for every segment of `transcript`.
    pub async fn generate_segment_images(
        &self,
        workspace: &JobWorkspace,
        context: PromptContext,
        transcript: &Transcript,
        cancel: &CancellationToken,
    ) -> Result<FanoutReport, FanoutError> {
        let total = transcript.sentences.len();
        if total == 0 {
            return Err(FanoutError::NoSegments);
        }

        info!(
            segments = total,
            max_concurrent = self.settings.max_concurrent,
            "Generating segment images"
        );

        let gate = Arc::new(Semaphore::new(self.settings.max_concurrent));
        let shared = Arc::new(segment::SegmentJob {
            context,
            closing_text: transcript.closing_text().to_string(),
            workspace: workspace.clone(),
            prompts: Arc::clone(&self.prompts),
            images: Arc::clone(&self.images),
            retry: self.settings.retry.clone(),
            call_timeout: self.settings.call_timeout,
        });

        let mut tasks = JoinSet::new();
        for (index, seg) in transcript.sentences.iter().enumerate() {
            let text = seg.prompt_text().to_string();
            let shared = Arc::clone(&shared);
            let gate = Arc::clone(&gate);
            let cancel = cancel.clone();
            let span = tracing::info_span!("segment", index = index + 1);
            tasks.spawn(
                async move {
                    let state = shared.run(index, text, &gate, &cancel).await;
                    (index, state)
                }
                .instrument(span),
            );
        }

        // Join barrier: every task reaches a terminal state before we decide.
        let mut outcomes: Vec<Option<SegmentState>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, state)) => outcomes[index] = Some(state),
                Err(e) => warn!("Segment task aborted: {}", e),
            }
        }

        collect_outcomes(outcomes)
    }
}

fn collect_outcomes(outcomes: Vec<Option<SegmentState>>) -> Result<FanoutReport, FanoutError> {
    let mut images = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    let mut cancelled = false;

    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Some(SegmentState::ImageReady { path }) => images.push(path),
            Some(SegmentState::PermanentlyFailed(failure)) => failures.push(failure),
            Some(SegmentState::Cancelled) => cancelled = true,
            Some(other) => failures.push(SegmentFailure::aborted(
                index,
                format!("task ended in non-terminal state {}", other.label()),
            )),
            None => failures.push(SegmentFailure::aborted(index, "task did not complete")),
        }
    }

    if cancelled {
        return Err(FanoutError::Cancelled);
    }
    if !failures.is_empty() {
        warn!(failed = failures.len(), "Segment image generation had failures");
        return Err(FanoutError::Segments(failures));
    }
    debug!(images = images.len(), "All segment images written");
    Ok(FanoutReport { images })
}
