use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{JobRepository, RepositoryError};
use crate::models::job::PhotoJob;

/// Job repository held in process memory. Used when no `DATABASE_URL` is
/// configured and in tests.
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<Uuid, PhotoJob>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn insert(&self, job: &PhotoJob) -> Result<(), RepositoryError> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn load(&self, job_id: Uuid) -> Result<PhotoJob, RepositoryError> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(RepositoryError::NotFound(job_id))
    }

    async fn save(&self, job: &PhotoJob) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(stored) => {
                *stored = job.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(job.id)),
        }
    }

    async fn load_many(&self, job_ids: &[Uuid]) -> Result<Vec<PhotoJob>, RepositoryError> {
        let stored = self.jobs.read().await;
        let mut jobs: Vec<PhotoJob> = stored
            .iter()
            .filter(|(id, _)| job_ids.contains(id))
            .map(|(_, job)| job.clone())
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<PhotoJob>, RepositoryError> {
        let mut jobs: Vec<PhotoJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit.max(0) as usize);
        Ok(jobs)
    }

    async fn health_check(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
