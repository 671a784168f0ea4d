use async_trait::async_trait;

use super::{with_identity, JobStore, StoreError};
use crate::db::job_repo::{self, VideoJobRow};
use crate::db::Database;
use crate::job::VideoJob;

/// Job store over the SQLite database. Queries run on the blocking pool.
#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn load(&self, id: &str) -> Result<VideoJob, StoreError> {
        let id = id.to_string();
        self.blocking(move |db| {
            let row = job_repo::find_by_id(db, &id)?.ok_or(StoreError::NotFound(id))?;
            Ok(row.into_job()?)
        })
        .await
    }

    async fn save(&self, job: &VideoJob) -> Result<VideoJob, StoreError> {
        let stored = with_identity(job);
        let row = VideoJobRow::from_job(&stored);
        self.blocking(move |db| {
            job_repo::upsert(db, &row)?;
            Ok(())
        })
        .await?;

        tracing::debug!(
            job_id = %stored.id,
            stage = %stored.stage(),
            progress = stored.progress(),
            "Job saved"
        );
        Ok(stored)
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        newest_first: bool,
    ) -> Result<Vec<VideoJob>, StoreError> {
        let owner_id = owner_id.to_string();
        self.blocking(move |db| {
            job_repo::list_by_owner(db, &owner_id, newest_first)?
                .into_iter()
                .map(|row| row.into_job().map_err(StoreError::from))
                .collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{checkpoint, Stage, Step, VideoInput};

    fn store() -> SqliteJobStore {
        SqliteJobStore::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_save_assigns_id_once() {
        let store = store();
        let job = VideoJob::new("owner-1", VideoInput::new("Volcanoes", "_hotline"));

        let saved = store.save(&job).await.unwrap();
        assert!(saved.has_id());

        let again = store.save(&saved).await.unwrap();
        assert_eq!(again.id, saved.id);
        assert_eq!(store.list_by_owner("owner-1", true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_incremental_updates_are_visible() {
        let store = store();
        let mut job = store
            .save(&VideoJob::new("owner-1", VideoInput::new("Volcanoes", "_hotline")))
            .await
            .unwrap();

        job.script = "Lava flows.".into();
        job.complete(Step::Script, checkpoint::SCRIPT).unwrap();
        store.save(&job).await.unwrap();

        let loaded = store.load(&job.id).await.unwrap();
        assert_eq!(loaded.stage(), Stage::Speech);
        assert_eq!(loaded.progress(), checkpoint::SCRIPT);
        assert_eq!(loaded.script, "Lava flows.");
    }

    #[tokio::test]
    async fn test_load_missing() {
        let err = store().load("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "missing"));
    }
}
