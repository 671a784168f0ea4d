//! The durable job record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::input::VideoInput;
use super::stage::{checkpoint, Stage, StageFlags, Step, VisualSource};

/// Message shown to job owners in place of internal error details.
pub const USER_FACING_ERROR: &str = "An error happened in a step. Try creating the video again";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot complete step '{}' while job is at stage '{stage}'", .step.as_str())]
pub struct TransitionError {
    pub stage: Stage,
    pub step: Step,
}

/// Output locations produced by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobArtifacts {
    pub tts_url: Option<String>,
    pub transcript_url: Option<String>,
    pub final_video_url: Option<String>,
}

/// A video generation job.
///
/// Stage, progress and error are changed only through the transition
/// methods so the record always satisfies one of: running, failed with an
/// error message, or done at 100% with every flag set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoJob {
    /// Empty until the job store assigns one.
    pub id: String,
    pub owner_id: String,
    #[serde(flatten)]
    pub input: VideoInput,

    // Derived working fields
    #[serde(default)]
    pub cleaned_topic: String,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub essence: String,

    pub(crate) stage: Stage,
    pub(crate) visuals: Option<VisualSource>,
    pub(crate) progress: u8,
    pub(crate) error: Option<String>,

    #[serde(default)]
    pub artifacts: JobArtifacts,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoJob {
    pub fn new(owner_id: impl Into<String>, input: VideoInput) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            owner_id: owner_id.into(),
            input,
            cleaned_topic: String::new(),
            script: String::new(),
            essence: String::new(),
            stage: Stage::Script,
            visuals: None,
            progress: checkpoint::START,
            error: None,
            artifacts: JobArtifacts::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn visual_source(&self) -> Option<VisualSource> {
        self.visuals
    }

    pub fn flags(&self) -> StageFlags {
        StageFlags::derive(self.stage, self.visuals)
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    /// True while the job has neither finished nor failed.
    pub fn is_running(&self) -> bool {
        !self.stage.is_terminal()
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Nothing has run yet and nothing has failed.
    pub fn is_fresh(&self) -> bool {
        self.stage == Stage::Script && self.progress == checkpoint::START && self.error.is_none()
    }

    /// Error text suitable for the job's owner.
    pub fn user_facing_error(&self) -> Option<&'static str> {
        self.error.as_ref().map(|_| USER_FACING_ERROR)
    }

    /// Exactly one of failed, running, or complete holds.
    pub fn is_consistent(&self) -> bool {
        let failed = self.stage.is_failed() && self.error.as_deref().is_some_and(|e| !e.is_empty());
        let running = self.is_running() && self.error.is_none();
        let complete = self.is_done()
            && self.error.is_none()
            && self.progress == checkpoint::STITCHED
            && self.flags().all();
        [failed, running, complete].iter().filter(|b| **b).count() == 1
    }

    /// Clears every derived field while keeping identity, owner and input.
    pub fn reset(&mut self) {
        self.cleaned_topic.clear();
        self.script.clear();
        self.essence.clear();
        self.stage = Stage::Script;
        self.visuals = None;
        self.progress = checkpoint::START;
        self.error = None;
        self.artifacts = JobArtifacts::default();
        self.touch();
    }

    /// Marks `step` complete and raises progress to `progress`.
    pub fn complete(&mut self, step: Step, progress: u8) -> Result<(), TransitionError> {
        if self.stage.pending_step() != Some(step) {
            return Err(TransitionError {
                stage: self.stage,
                step,
            });
        }
        self.stage = step.next_stage();
        self.progress = self.progress.max(progress);
        self.touch();
        Ok(())
    }

    /// Marks the visuals step complete for the given path.
    pub fn complete_visuals(&mut self, source: VisualSource) -> Result<(), TransitionError> {
        let progress = match source {
            VisualSource::Stock => checkpoint::STOCK_MATCHED,
            VisualSource::Ai => checkpoint::IMAGES,
        };
        self.complete(Step::Visuals, progress)?;
        self.visuals = Some(source);
        Ok(())
    }

    /// Records a failure of the currently pending step.
    pub fn fail(&mut self, message: impl Into<String>) {
        let step = self.stage.pending_step().unwrap_or(Step::Stitching);
        let message = message.into();
        self.stage = Stage::Failed(step);
        self.error = Some(if message.is_empty() {
            format!("{} failed", step.as_str())
        } else {
            message
        });
        self.touch();
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
