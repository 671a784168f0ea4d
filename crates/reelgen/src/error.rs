use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReelgenError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid job input: {0}")]
    Input(#[from] crate::job::InputError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Job store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] crate::collaborators::CollaboratorError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Failed to parse job input '{path}': {source}")]
    InputFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Service '{service}' is not configured: {reason}")]
    MissingService {
        service: &'static str,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove directory '{path}': {source}")]
    RemoveDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode '{path}': {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid job identifier for workspace: '{0}'")]
    InvalidJobId(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Job '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Job has no identity; save it before submitting")]
    MissingJobId,

    #[error("Worker pool is shutting down")]
    ShuttingDown,
}

pub type Result<T> = std::result::Result<T, ReelgenError>;
