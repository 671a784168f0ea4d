//! Pipeline stage state machine.
//!
//! A job's position in the pipeline is a single [`Stage`] value. The
//! completion flags exposed to callers ([`StageFlags`]) are computed from it,
//! so an out-of-order combination of flags cannot be represented.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Fixed progress percentages reached when a step completes.
pub mod checkpoint {
    pub const START: u8 = 0;
    pub const SCRIPT: u8 = 10;
    pub const SPEECH: u8 = 30;
    pub const TRANSCRIPT: u8 = 50;
    pub const STOCK_MATCHED: u8 = 60;
    pub const IMAGES: u8 = 80;
    pub const STITCHED: u8 = 100;
}

/// One unit of work in the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Script,
    Speech,
    Transcript,
    Visuals,
    Stitching,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Script,
        Step::Speech,
        Step::Transcript,
        Step::Visuals,
        Step::Stitching,
    ];

    /// Position of the step in the pipeline (0-based).
    pub fn ordinal(&self) -> usize {
        match self {
            Step::Script => 0,
            Step::Speech => 1,
            Step::Transcript => 2,
            Step::Visuals => 3,
            Step::Stitching => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Script => "script",
            Step::Speech => "speech",
            Step::Transcript => "transcript",
            Step::Visuals => "visuals",
            Step::Stitching => "stitching",
        }
    }

    /// The stage a job enters once this step has completed.
    pub fn next_stage(&self) -> Stage {
        match self {
            Step::Script => Stage::Speech,
            Step::Speech => Stage::Transcript,
            Step::Transcript => Stage::Visuals,
            Step::Visuals => Stage::Stitching,
            Step::Stitching => Stage::Done,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Script => write!(f, "Writing script"),
            Step::Speech => write!(f, "Synthesizing speech"),
            Step::Transcript => write!(f, "Aligning transcript"),
            Step::Visuals => write!(f, "Acquiring visuals"),
            Step::Stitching => write!(f, "Stitching video"),
        }
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("unknown step '{}'", s))
    }
}

/// Where a job stands. Non-terminal variants name the step that runs next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "stage", content = "step", rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Script,
    Speech,
    Transcript,
    Visuals,
    Stitching,
    Done,
    /// The named step failed; every step before it had completed.
    Failed(Step),
}

impl Stage {
    /// The step this stage is waiting to run, if any.
    pub fn pending_step(&self) -> Option<Step> {
        match self {
            Stage::Script => Some(Step::Script),
            Stage::Speech => Some(Step::Speech),
            Stage::Transcript => Some(Step::Transcript),
            Stage::Visuals => Some(Step::Visuals),
            Stage::Stitching => Some(Step::Stitching),
            Stage::Done | Stage::Failed(_) => None,
        }
    }

    /// Number of steps that have completed.
    pub fn completed_steps(&self) -> usize {
        match self {
            Stage::Done => Step::ALL.len(),
            Stage::Failed(step) => step.ordinal(),
            other => other.pending_step().map(|s| s.ordinal()).unwrap_or(0),
        }
    }

    pub fn has_completed(&self, step: Step) -> bool {
        step.ordinal() < self.completed_steps()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Stage::Failed(_))
    }

    /// Column encoding: the stage name, plus the failed step for `Failed`.
    pub fn to_columns(&self) -> (&'static str, Option<&'static str>) {
        match self {
            Stage::Script => ("script", None),
            Stage::Speech => ("speech", None),
            Stage::Transcript => ("transcript", None),
            Stage::Visuals => ("visuals", None),
            Stage::Stitching => ("stitching", None),
            Stage::Done => ("done", None),
            Stage::Failed(step) => ("failed", Some(step.as_str())),
        }
    }

    pub fn from_columns(stage: &str, failed_step: Option<&str>) -> Result<Self, String> {
        match stage {
            "script" => Ok(Stage::Script),
            "speech" => Ok(Stage::Speech),
            "transcript" => Ok(Stage::Transcript),
            "visuals" => Ok(Stage::Visuals),
            "stitching" => Ok(Stage::Stitching),
            "done" => Ok(Stage::Done),
            "failed" => {
                let step = failed_step.ok_or("failed stage without a step")?;
                Ok(Stage::Failed(step.parse()?))
            }
            other => Err(format!("unknown stage '{}'", other)),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Done => write!(f, "done"),
            Stage::Failed(step) => write!(f, "failed during {}", step.as_str()),
            other => match other.pending_step() {
                Some(step) => write!(f, "{}", step.as_str()),
                None => Ok(()),
            },
        }
    }
}

/// Which visual path completed the visuals step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualSource {
    Stock,
    Ai,
}

impl VisualSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualSource::Stock => "stock",
            VisualSource::Ai => "ai",
        }
    }
}

impl FromStr for VisualSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stock" => Ok(VisualSource::Stock),
            "ai" => Ok(VisualSource::Ai),
            other => Err(format!("unknown visual source '{}'", other)),
        }
    }
}

/// Boolean completion flags as seen by callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageFlags {
    pub script_generated: bool,
    pub tts_generated: bool,
    pub srt_generated: bool,
    pub prompts_generated: bool,
    pub images_generated: bool,
    pub video_stitched: bool,
    pub video_uploaded: bool,
}

impl StageFlags {
    pub fn derive(stage: Stage, visuals: Option<VisualSource>) -> Self {
        let done = stage == Stage::Done;
        let ai_images = stage.has_completed(Step::Visuals) && visuals == Some(VisualSource::Ai);
        Self {
            script_generated: stage.has_completed(Step::Script),
            tts_generated: stage.has_completed(Step::Speech),
            srt_generated: stage.has_completed(Step::Transcript),
            prompts_generated: done || ai_images,
            images_generated: done || ai_images,
            video_stitched: done,
            video_uploaded: done,
        }
    }

    pub fn all(&self) -> bool {
        self.script_generated
            && self.tts_generated
            && self.srt_generated
            && self.prompts_generated
            && self.images_generated
            && self.video_stitched
            && self.video_uploaded
    }

    /// True when every implied flag is also set.
    pub fn is_ordered(&self) -> bool {
        (!self.tts_generated || self.script_generated)
            && (!self.srt_generated || self.tts_generated)
            && (!self.images_generated || self.srt_generated)
            && (!self.prompts_generated || self.srt_generated)
            && (!self.video_stitched || self.srt_generated)
            && (!self.video_uploaded || self.video_stitched)
    }
}
