//! Lifecycle of a single segment task.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::retry::{RetryExhausted, RetrySchedule};
use crate::collaborators::{
    service, with_timeout, ImageGenerator, ImagePromptGenerator, PromptContext,
};
use crate::storage::JobWorkspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentPhase {
    Prompt,
    Image,
    Save,
    Admission,
}

impl SegmentPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentPhase::Prompt => "prompt",
            SegmentPhase::Image => "image",
            SegmentPhase::Save => "save",
            SegmentPhase::Admission => "admission",
        }
    }
}

/// A segment that reached `PermanentlyFailed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFailure {
    /// 0-based segment index.
    pub index: usize,
    pub phase: SegmentPhase,
    pub attempts: usize,
    pub message: String,
}

impl SegmentFailure {
    pub(crate) fn aborted(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            phase: SegmentPhase::Admission,
            attempts: 0,
            message: message.into(),
        }
    }
}

impl fmt::Display for SegmentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "segment {}: {} failed after {} attempts: {}",
            self.index + 1,
            self.phase.as_str(),
            self.attempts,
            self.message
        )
    }
}

/// `Pending -> PromptRetrying* -> PromptReady -> ImageRetrying* -> ImageReady`,
/// or `PermanentlyFailed` once either retry loop runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentState {
    Pending,
    PromptRetrying { attempt: usize },
    PromptReady,
    ImageRetrying { attempt: usize },
    ImageReady { path: PathBuf },
    PermanentlyFailed(SegmentFailure),
    Cancelled,
}

impl SegmentState {
    pub fn label(&self) -> &'static str {
        match self {
            SegmentState::Pending => "pending",
            SegmentState::PromptRetrying { .. } => "prompt_retrying",
            SegmentState::PromptReady => "prompt_ready",
            SegmentState::ImageRetrying { .. } => "image_retrying",
            SegmentState::ImageReady { .. } => "image_ready",
            SegmentState::PermanentlyFailed(_) => "permanently_failed",
            SegmentState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SegmentState::ImageReady { .. }
                | SegmentState::PermanentlyFailed(_)
                | SegmentState::Cancelled
        )
    }
}

fn transition(state: &mut SegmentState, next: SegmentState) {
    debug!(from = state.label(), to = next.label(), "Segment state");
    *state = next;
}

/// Everything a segment task shares with its siblings.
pub(crate) struct SegmentJob {
    pub context: PromptContext,
    pub closing_text: String,
    pub workspace: JobWorkspace,
    pub prompts: Arc<dyn ImagePromptGenerator>,
    pub images: Arc<dyn ImageGenerator>,
    pub retry: RetrySchedule,
    pub call_timeout: Duration,
}

impl SegmentJob {
    /// Drives one segment to a terminal state.
    pub(crate) async fn run(
        &self,
        index: usize,
        text: String,
        gate: &Semaphore,
        cancel: &CancellationToken,
    ) -> SegmentState {
        let mut state = SegmentState::Pending;

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return SegmentState::Cancelled,
            permit = gate.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    return SegmentState::PermanentlyFailed(SegmentFailure::aborted(
                        index,
                        "admission gate closed",
                    ))
                }
            },
        };

        // Prompt phase
        let prompt = {
            let (text, context, closing) = (text.as_str(), &self.context, self.closing_text.as_str());
            let (prompts, limit) = (&self.prompts, self.call_timeout);
            let result = self
                .retry
                .run(
                    cancel,
                    move |_| {
                        with_timeout(
                            service::PROMPTS,
                            limit,
                            prompts.prompt_for(text, context, closing),
                        )
                    },
                    |attempt, err, delay| {
                        warn!(attempt, "Prompt failed, retrying in {:?}: {}", delay, err);
                        transition(&mut state, SegmentState::PromptRetrying { attempt });
                    },
                )
                .await;
            match result {
                Ok(prompt) => prompt,
                Err(exhausted) => return self.give_up(index, SegmentPhase::Prompt, exhausted),
            }
        };
        transition(&mut state, SegmentState::PromptReady);

        // Image phase
        let image = {
            let (prompt, style) = (prompt.as_str(), self.context.style);
            let (images, limit) = (&self.images, self.call_timeout);
            let result = self
                .retry
                .run(
                    cancel,
                    move |_| with_timeout(service::IMAGES, limit, images.render(prompt, style)),
                    |attempt, err, delay| {
                        warn!(attempt, "Image failed, retrying in {:?}: {}", delay, err);
                        transition(&mut state, SegmentState::ImageRetrying { attempt });
                    },
                )
                .await;
            match result {
                Ok(image) => image,
                Err(exhausted) => return self.give_up(index, SegmentPhase::Image, exhausted),
            }
        };

        match self.workspace.write_image(index, &image).await {
            Ok(path) => {
                transition(&mut state, SegmentState::ImageReady { path });
                state
            }
            Err(e) => SegmentState::PermanentlyFailed(SegmentFailure {
                index,
                phase: SegmentPhase::Save,
                attempts: 1,
                message: e.to_string(),
            }),
        }
    }

    fn give_up<E: fmt::Display>(
        &self,
        index: usize,
        phase: SegmentPhase,
        exhausted: RetryExhausted<E>,
    ) -> SegmentState {
        match exhausted {
            RetryExhausted::Cancelled => SegmentState::Cancelled,
            RetryExhausted::Failed { attempts, error } => {
                warn!(phase = phase.as_str(), attempts, "Segment failed permanently: {}", error);
                SegmentState::PermanentlyFailed(SegmentFailure {
                    index,
                    phase,
                    attempts,
                    message: error.to_string(),
                })
            }
        }
    }
}
