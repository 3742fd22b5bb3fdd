use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use uuid::Uuid;

use crate::models::job::PhotoJob;

pub mod memory;
pub mod queries;

pub use memory::InMemoryJobRepository;
pub use queries::PgJobRepository;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Persistence for photo job records.
///
/// The orchestrator is the only writer of a job's status and artifacts;
/// status readers may observe any intermediate state.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn insert(&self, job: &PhotoJob) -> Result<(), RepositoryError>;

    async fn load(&self, job_id: Uuid) -> Result<PhotoJob, RepositoryError>;

    /// Full overwrite of an existing record.
    async fn save(&self, job: &PhotoJob) -> Result<(), RepositoryError>;

    /// The jobs among `job_ids` that exist, most recently created first.
    /// Unknown ids are skipped.
    async fn load_many(&self, job_ids: &[Uuid]) -> Result<Vec<PhotoJob>, RepositoryError>;

    /// Most recently created jobs first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<PhotoJob>, RepositoryError>;

    async fn health_check(&self) -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Photo job not found: {0}")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored record is invalid: {0}")]
    Corrupt(String),
}
