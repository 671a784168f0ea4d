use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{with_identity, JobStore, StoreError};
use crate::job::VideoJob;

/// In-memory job store that also keeps every saved snapshot in order.
///
/// Used for dry runs and by tests that assert on the sequence of persisted
/// states.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, VideoJob>>,
    history: RwLock<Vec<VideoJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record passed to `save`, oldest first.
    pub fn snapshots(&self) -> Vec<VideoJob> {
        match self.history.read() {
            Ok(history) => history.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Snapshots of a single job, oldest first.
    pub fn snapshots_for(&self, id: &str) -> Vec<VideoJob> {
        self.snapshots()
            .into_iter()
            .filter(|job| job.id == id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn load(&self, id: &str) -> Result<VideoJob, StoreError> {
        let jobs = self.jobs.read().map_err(|_| StoreError::LockPoisoned)?;
        jobs.get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn save(&self, job: &VideoJob) -> Result<VideoJob, StoreError> {
        let mut stored = with_identity(job);
        {
            let mut jobs = self.jobs.write().map_err(|_| StoreError::LockPoisoned)?;
            if let Some(existing) = jobs.get(&stored.id) {
                stored.created_at = existing.created_at;
            }
            jobs.insert(stored.id.clone(), stored.clone());
        }
        self.history
            .write()
            .map_err(|_| StoreError::LockPoisoned)?
            .push(stored.clone());
        Ok(stored)
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        newest_first: bool,
    ) -> Result<Vec<VideoJob>, StoreError> {
        let jobs = self.jobs.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut owned: Vec<VideoJob> = jobs
            .values()
            .filter(|job| job.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        if newest_first {
            owned.reverse();
        }
        Ok(owned)
    }
}
