//! Persistence boundary for job records.
//!
//! The pipeline only needs load, save and an owner listing. `save` is an
//! upsert: a record without an id gets one assigned, a record with an id
//! overwrites the stored copy. Callers are responsible for not running two
//! pipelines against the same id at once.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::job::VideoJob;

pub use memory::MemoryJobStore;
pub use sqlite::SqliteJobStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Job '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Job store lock poisoned")]
    LockPoisoned,

    #[error("Job store task failed: {0}")]
    Task(String),
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<VideoJob, StoreError>;

    /// Creates or updates the record and returns the stored copy.
    async fn save(&self, job: &VideoJob) -> Result<VideoJob, StoreError>;

    async fn list_by_owner(
        &self,
        owner_id: &str,
        newest_first: bool,
    ) -> Result<Vec<VideoJob>, StoreError>;
}

/// Copy of `job` with an identity, generating one if missing.
pub(crate) fn with_identity(job: &VideoJob) -> VideoJob {
    let mut stored = job.clone();
    if !stored.has_id() {
        stored.id = uuid::Uuid::new_v4().to_string();
    }
    stored
}
