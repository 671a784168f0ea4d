use thiserror::Error;

use crate::job::Stage;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid job input: {0}")]
    Input(#[from] crate::job::InputError),

    #[error("Job '{id}' has already run (stage: {stage}); run it again with recreate")]
    NotFresh { id: String, stage: Stage },

    #[error("Job store failed: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Workspace failed: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error(transparent)]
    Collaborator(#[from] crate::collaborators::CollaboratorError),

    #[error(transparent)]
    Fanout(#[from] crate::fanout::FanoutError),

    #[error("Invalid stage transition: {0}")]
    Transition(#[from] crate::job::TransitionError),

    #[error("{0} missing from an earlier step")]
    MissingArtifact(&'static str),

    #[error("job cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Errors raised before the job is touched; these are not written into the record.
    pub fn is_rejection(&self) -> bool {
        matches!(self, PipelineError::Input(_) | PipelineError::NotFresh { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    /// Stock footage was unusable and AI images were generated instead.
    StockFallback { reason: String },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::StockFallback { reason } => {
                write!(f, "stock footage skipped: {}", reason)
            }
        }
    }
}
