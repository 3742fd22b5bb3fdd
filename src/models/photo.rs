use serde::Serialize;
use uuid::Uuid;

use crate::models::job::{JobStatus, PhotoJob, ProcessingOptions};

/// Response after submitting a photo for processing.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub photo_id: Uuid,
    pub status: JobStatus,
    pub message: String,
}

/// Response after submitting several photos with shared options.
#[derive(Debug, Serialize)]
pub struct BatchSubmitResponse {
    pub photo_ids: Vec<Uuid>,
    pub message: String,
}

/// Response for polling a photo's processing status.
#[derive(Debug, Serialize)]
pub struct PhotoStatusResponse {
    pub photo_id: Uuid,
    pub status: JobStatus,
    pub options: ProcessingOptions,
    pub compression_ratio: f64,
    pub original_size: u64,
    pub compressed_size: Option<u64>,
    pub has_compressed: bool,
    pub has_watermark_removed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&PhotoJob> for PhotoStatusResponse {
    fn from(job: &PhotoJob) -> Self {
        Self {
            photo_id: job.id,
            status: job.status,
            options: job.options,
            compression_ratio: job.compression_ratio(),
            original_size: job.original_size,
            compressed_size: job.compressed_size(),
            has_compressed: job.compressed_image.is_some(),
            has_watermark_removed: job.watermark_removed_image.is_some(),
            compression_error: job.compression_error.clone(),
            watermark_error: job.watermark_error.clone(),
            error: job.error.clone(),
        }
    }
}
