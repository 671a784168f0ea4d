pub mod broadcast;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod error;
pub mod fanout;
pub mod job;
pub mod logging;
pub mod pipeline;
pub mod secrets;
pub mod storage;
pub mod store;
pub mod worker;

pub use broadcast::{JobProgressBroadcaster, JobProgressEvent};
pub use collaborators::{build_collaborators, Collaborators};
pub use config::{load_config, Config};
pub use error::{ConfigError, ReelgenError, Result, StorageError, WorkerError};
pub use fanout::{FanoutError, SegmentFanout};
pub use job::{Stage, StageFlags, VideoInput, VideoJob};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, RunSummary};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use store::{JobStore, MemoryJobStore, SqliteJobStore, StoreError};
pub use worker::{JobResult, WorkerPool};
