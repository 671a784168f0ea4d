//! Capability interfaces for the external generation services.
//!
//! Each trait is one request/response call. Failures come back as
//! [`CollaboratorError`] and the pipeline treats them all the same way.

pub mod http;
pub mod stub;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Config, ServiceMode};
use crate::error::ConfigError;
use crate::job::{Narrator, Segment, StockClip, VisualStyle};

/// Service names used in errors and logs.
pub mod service {
    pub const SCRIPT: &str = "script writer";
    pub const SPEECH: &str = "speech synthesizer";
    pub const ALIGNER: &str = "transcript aligner";
    pub const STOCK: &str = "stock footage";
    pub const PROMPTS: &str = "image prompts";
    pub const IMAGES: &str = "image generator";
    pub const STITCHER: &str = "video stitcher";
}

#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("{service}: request failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service}: HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service}: invalid response: {reason}")]
    InvalidResponse {
        service: &'static str,
        reason: String,
    },

    #[error("{service}: no response within {secs}s")]
    Timeout { service: &'static str, secs: u64 },

    #[error("{service}: {message}")]
    Failed {
        service: &'static str,
        message: String,
    },
}

impl CollaboratorError {
    pub fn invalid(service: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service,
            reason: reason.into(),
        }
    }

    pub fn failed(service: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            service,
            message: message.into(),
        }
    }

    pub fn service(&self) -> &'static str {
        match self {
            Self::Request { service, .. }
            | Self::Status { service, .. }
            | Self::InvalidResponse { service, .. }
            | Self::Timeout { service, .. }
            | Self::Failed { service, .. } => service,
        }
    }
}

/// Output of the script writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDraft {
    pub cleaned_topic: String,
    pub script: String,
    /// One or two words describing the visuals, used as the stock query.
    pub essence: String,
}

/// Job-level context shared by every segment prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub topic: String,
    pub description: String,
    /// The script writer's short visual summary.
    pub essence: String,
    pub style: VisualStyle,
}

#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn write(&self, topic: &str, description: &str) -> Result<ScriptDraft, CollaboratorError>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, script: &str, narrator: Narrator)
        -> Result<Vec<u8>, CollaboratorError>;
}

#[async_trait]
pub trait TranscriptAligner: Send + Sync {
    /// Returns the narration split into timed sentences, in order.
    async fn align(&self, audio: &[u8], script: &str) -> Result<Vec<Segment>, CollaboratorError>;
}

#[async_trait]
pub trait StockFootageMatcher: Send + Sync {
    /// Candidate clips for the query, best first. An empty result is an error.
    async fn find_clips(
        &self,
        essence: &str,
        segment_count: usize,
    ) -> Result<Vec<StockClip>, CollaboratorError>;
}

#[async_trait]
pub trait ImagePromptGenerator: Send + Sync {
    async fn prompt_for(
        &self,
        segment_text: &str,
        context: &PromptContext,
        closing_text: &str,
    ) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn render(&self, prompt: &str, style: VisualStyle) -> Result<Vec<u8>, CollaboratorError>;
}

#[async_trait]
pub trait VideoStitcher: Send + Sync {
    /// Assembles the job's artifacts and returns the final video URL.
    async fn stitch(&self, job_id: &str, background_music: &str)
        -> Result<String, CollaboratorError>;
}

/// The full set of services a pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub script: Arc<dyn ScriptGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub aligner: Arc<dyn TranscriptAligner>,
    pub stock: Arc<dyn StockFootageMatcher>,
    pub prompts: Arc<dyn ImagePromptGenerator>,
    pub images: Arc<dyn ImageGenerator>,
    pub stitcher: Arc<dyn VideoStitcher>,
}

/// Builds the collaborators selected by `services.mode`.
pub fn build_collaborators(config: &Config) -> Result<Collaborators, ConfigError> {
    match config.services.mode {
        ServiceMode::Stub => {
            tracing::info!("Using stub collaborators");
            Ok(stub::collaborators())
        }
        ServiceMode::Http => http::collaborators(config),
    }
}

/// Bounds `call` by `limit`; elapsing counts as a failure of `service`.
pub async fn with_timeout<T, F>(
    service: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout {
            service,
            secs: limit.as_secs(),
        }),
    }
}
