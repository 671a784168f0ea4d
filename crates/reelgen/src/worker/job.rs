use crate::job::{VideoJob, VisualSource};
use crate::pipeline::{PipelineError, RunSummary};

/// A job handed to the worker pool.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job: VideoJob,
    /// Clear previous progress and artifacts before running.
    pub recreate: bool,
}

impl JobRequest {
    pub fn new(job: VideoJob) -> Self {
        Self {
            job,
            recreate: false,
        }
    }

    pub fn recreate(job: VideoJob) -> Self {
        Self {
            job,
            recreate: true,
        }
    }
}

#[derive(Debug)]
pub struct JobResult {
    pub job_id: String,
    pub success: bool,
    /// Last persisted state of the job.
    pub job: VideoJob,
    pub visuals: Option<VisualSource>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl JobResult {
    pub fn success(job: VideoJob, summary: &RunSummary) -> Self {
        Self {
            job_id: job.id.clone(),
            success: true,
            job,
            visuals: Some(summary.visuals),
            warnings: summary.warnings.iter().map(ToString::to_string).collect(),
            error: None,
        }
    }

    pub fn failure(job: VideoJob, error: String) -> Self {
        Self {
            job_id: job.id.clone(),
            success: false,
            job,
            visuals: None,
            warnings: vec![],
            error: Some(error),
        }
    }

    pub fn from_run(job: VideoJob, result: Result<RunSummary, PipelineError>) -> Self {
        match result {
            Ok(summary) => Self::success(job, &summary),
            Err(e) => Self::failure(job, e.to_string()),
        }
    }
}
