use std::path::PathBuf;

use crate::job::{StockClip, Transcript, VideoJob};
use crate::storage::JobWorkspace;

use super::error::PipelineWarning;

pub struct PipelineContext {
    // Input
    pub job: VideoJob,
    pub workspace: JobWorkspace,

    // Step 2 result
    pub audio: Option<Vec<u8>>,

    // Step 3 result
    pub transcript: Option<Transcript>,

    // Step 4 results, one of the two is filled depending on the visual path
    pub clips: Vec<StockClip>,
    pub images: Vec<PathBuf>,

    // Non-fatal warnings
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(job: VideoJob, workspace: JobWorkspace) -> Self {
        Self {
            job,
            workspace,
            audio: None,
            transcript: None,
            clips: Vec::new(),
            images: Vec::new(),
            warnings: Vec::new(),
        }
    }
}
