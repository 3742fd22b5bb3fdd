use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::{JobRepository, RepositoryError};
use crate::models::job::{Artifact, JobStatus, PhotoJob, ProcessingOptions};

const JOB_COLUMNS: &str = r#"
    id, status, compress_image, compression_quality, remove_watermark,
    original_key, original_size, compressed_key, compressed_size,
    watermark_removed_key, watermark_removed_size,
    compression_error, watermark_error, error, created_at, updated_at
"#;

/// PostgreSQL-backed job repository (`photo_jobs` table).
#[derive(Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn artifact_from_row(
    row: &PgRow,
    key_column: &str,
    size_column: &str,
) -> Result<Option<Artifact>, RepositoryError> {
    let key: Option<String> = row.try_get(key_column)?;
    let size: Option<i64> = row.try_get(size_column)?;
    Ok(match (key, size) {
        (Some(key), Some(size)) => Some(Artifact {
            key,
            size: size as u64,
        }),
        _ => None,
    })
}

fn job_from_row(row: &PgRow) -> Result<PhotoJob, RepositoryError> {
    let status_str: String = row.try_get("status")?;
    let status = status_str
        .parse::<JobStatus>()
        .map_err(|_| RepositoryError::Corrupt(format!("unknown status '{}'", status_str)))?;

    let quality: i16 = row.try_get("compression_quality")?;
    let compression_quality = u8::try_from(quality)
        .map_err(|_| RepositoryError::Corrupt(format!("compression quality {}", quality)))?;
    let original_size: i64 = row.try_get("original_size")?;

    Ok(PhotoJob {
        id: row.try_get("id")?,
        status,
        options: ProcessingOptions {
            compress: row.try_get("compress_image")?,
            compression_quality,
            remove_watermark: row.try_get("remove_watermark")?,
        },
        original_key: row.try_get("original_key")?,
        original_size: original_size as u64,
        compressed_image: artifact_from_row(row, "compressed_key", "compressed_size")?,
        watermark_removed_image: artifact_from_row(
            row,
            "watermark_removed_key",
            "watermark_removed_size",
        )?,
        compression_error: row.try_get("compression_error")?,
        watermark_error: row.try_get("watermark_error")?,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn insert(&self, job: &PhotoJob) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO photo_jobs (
                id, status, compress_image, compression_quality, remove_watermark,
                original_key, original_size, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(job.id)
        .bind(job.status.as_ref())
        .bind(job.options.compress)
        .bind(job.options.compression_quality as i16)
        .bind(job.options.remove_watermark)
        .bind(&job.original_key)
        .bind(job.original_size as i64)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self, job_id: Uuid) -> Result<PhotoJob, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM photo_jobs WHERE id = $1", JOB_COLUMNS))
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => job_from_row(&r),
            None => Err(RepositoryError::NotFound(job_id)),
        }
    }

    async fn save(&self, job: &PhotoJob) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE photo_jobs
            SET status = $2,
                compressed_key = $3,
                compressed_size = $4,
                watermark_removed_key = $5,
                watermark_removed_size = $6,
                compression_error = $7,
                watermark_error = $8,
                error = $9,
                updated_at = $10,
                processing_started_at = CASE WHEN $2 = 'processing' THEN NOW() ELSE processing_started_at END,
                processing_completed_at = CASE WHEN $2 IN ('completed', 'failed') THEN NOW() ELSE processing_completed_at END
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(job.status.as_ref())
        .bind(job.compressed_image.as_ref().map(|a| a.key.as_str()))
        .bind(job.compressed_image.as_ref().map(|a| a.size as i64))
        .bind(job.watermark_removed_image.as_ref().map(|a| a.key.as_str()))
        .bind(job.watermark_removed_image.as_ref().map(|a| a.size as i64))
        .bind(job.compression_error.as_deref())
        .bind(job.watermark_error.as_deref())
        .bind(job.error.as_deref())
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(job.id));
        }
        Ok(())
    }

    async fn load_many(&self, job_ids: &[Uuid]) -> Result<Vec<PhotoJob>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM photo_jobs WHERE id = ANY($1) ORDER BY created_at DESC",
            JOB_COLUMNS
        ))
        .bind(job_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<PhotoJob>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM photo_jobs ORDER BY created_at DESC LIMIT $1",
            JOB_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    async fn health_check(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
