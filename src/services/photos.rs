//! Submission boundary: accepts uploads, records pending jobs and hands
//! them to the worker pool. Also serves status and artifact reads.

use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::RepositoryError;
use crate::models::job::{ArtifactKind, JobStateError, PhotoJob, ProcessingOptions};
use crate::processing::{sniff_format, ProcessingError};
use crate::services::queue::QueueError;
use crate::services::storage::StorageError;

/// Store the original, record a pending job and queue it.
///
/// Returns as soon as the job is queued. If the pool refuses the job it is
/// recorded as failed and the queue error is returned.
pub async fn submit_photo(
    state: &AppState,
    data: Vec<u8>,
    options: ProcessingOptions,
) -> Result<PhotoJob, SubmitError> {
    options
        .validate()
        .map_err(|e| SubmitError::InvalidOptions(e.to_string()))?;
    sniff_format(&data)?;

    enqueue(state, data, options).await
}

/// Submit several originals sharing the same options.
///
/// Every upload is checked and a queue slot is reserved for each before any
/// job is created, so the batch is queued whole or not at all.
pub async fn submit_batch(
    state: &AppState,
    images: Vec<Vec<u8>>,
    options: ProcessingOptions,
) -> Result<Vec<PhotoJob>, SubmitError> {
    if images.is_empty() {
        return Err(SubmitError::NoImages);
    }
    options
        .validate()
        .map_err(|e| SubmitError::InvalidOptions(e.to_string()))?;
    for data in &images {
        sniff_format(data)?;
    }

    let reservation = state.queue.reserve(images.len()).inspect_err(|e| {
        tracing::warn!(count = images.len(), error = %e, "Photo batch rejected by worker pool");
    })?;

    let mut jobs = Vec::with_capacity(images.len());
    for data in images {
        match record_pending(state, data, options).await {
            Ok(job) => jobs.push(job),
            Err(e) => {
                abandon(state, jobs, &e).await;
                return Err(e);
            }
        }
    }

    reservation.send_all(jobs.iter().map(|job| job.id));
    tracing::info!(count = jobs.len(), "Photo batch submitted");
    Ok(jobs)
}

/// Store the original and insert its pending job record.
async fn record_pending(
    state: &AppState,
    data: Vec<u8>,
    options: ProcessingOptions,
) -> Result<PhotoJob, SubmitError> {
    let job_id = Uuid::new_v4();
    let original_key = state.storage.write_original(job_id, &data).await?;
    let job = PhotoJob::new(job_id, options, original_key, data.len() as u64);
    state.repository.insert(&job).await?;
    metrics::counter!("photo_jobs_submitted_total").increment(1);

    tracing::info!(
        job_id = %job_id,
        size = job.original_size,
        compress = options.compress,
        remove_watermark = options.remove_watermark,
        "Photo submitted"
    );
    Ok(job)
}

async fn enqueue(
    state: &AppState,
    data: Vec<u8>,
    options: ProcessingOptions,
) -> Result<PhotoJob, SubmitError> {
    let mut job = record_pending(state, data, options).await?;

    if let Err(e) = state.queue.submit(job.id) {
        tracing::warn!(job_id = %job.id, error = %e, "Photo job rejected by worker pool");
        job.fail(format!("Could not queue job: {}", e))?;
        state.repository.save(&job).await?;
        metrics::counter!("photo_jobs_failed_total").increment(1);
        return Err(SubmitError::Queue(e));
    }

    Ok(job)
}

/// Mark jobs of a half-created batch as failed. They were never queued.
async fn abandon(state: &AppState, jobs: Vec<PhotoJob>, cause: &SubmitError) {
    for mut job in jobs {
        let saved = match job.fail(format!("Batch submission aborted: {}", cause)) {
            Ok(()) => state.repository.save(&job).await.map_err(SubmitError::from),
            Err(e) => Err(e.into()),
        };
        match saved {
            Ok(()) => metrics::counter!("photo_jobs_failed_total").increment(1),
            Err(e) => tracing::error!(job_id = %job.id, error = %e, "Could not mark abandoned job failed"),
        }
    }
}

pub async fn photo_status(state: &AppState, job_id: Uuid) -> Result<PhotoJob, RepositoryError> {
    state.repository.load(job_id).await
}

/// Status of a submitted batch. Ids with no job are left out.
pub async fn batch_status(state: &AppState, job_ids: &[Uuid]) -> Result<Vec<PhotoJob>, RepositoryError> {
    state.repository.load_many(job_ids).await
}

pub async fn recent_photos(state: &AppState, limit: i64) -> Result<Vec<PhotoJob>, RepositoryError> {
    state.repository.list_recent(limit).await
}

/// Bytes of the original or one of its artifacts. `None` means the job has
/// no such artifact.
pub async fn photo_bytes(
    state: &AppState,
    job: &PhotoJob,
    kind: Option<ArtifactKind>,
) -> Result<Option<Vec<u8>>, StorageError> {
    match kind {
        None => state.storage.read_original(job.id).await.map(Some),
        Some(kind) if job.artifact(kind).is_some() => {
            state.storage.read_artifact(job.id, kind).await.map(Some)
        }
        Some(_) => Ok(None),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Invalid processing options: {0}")]
    InvalidOptions(String),

    #[error("No images provided")]
    NoImages,

    #[error(transparent)]
    UnsupportedImage(#[from] ProcessingError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    State(#[from] JobStateError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}
