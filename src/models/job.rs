use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Default JPEG quality for the compression step.
pub const DEFAULT_COMPRESSION_QUALITY: u8 = 85;

/// Status of a photo job in the async pipeline.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Forward-only lifecycle: `Pending -> Processing -> {Completed, Failed}`,
    /// with any non-terminal state allowed to fail.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Pending, JobStatus::Processing) => true,
            (JobStatus::Processing, JobStatus::Completed) => true,
            (from, JobStatus::Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Kind of processed output stored alongside the original.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactKind {
    Compressed,
    WatermarkRemoved,
}

/// Processing options captured when the photo is submitted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct ProcessingOptions {
    #[garde(skip)]
    pub compress: bool,

    #[garde(range(min = 1, max = 100))]
    pub compression_quality: u8,

    #[garde(skip)]
    pub remove_watermark: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            compress: false,
            compression_quality: DEFAULT_COMPRESSION_QUALITY,
            remove_watermark: false,
        }
    }
}

/// A stored output of one processing step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    pub key: String,
    pub size: u64,
}

/// A photo moving through the processing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub options: ProcessingOptions,
    pub original_key: String,
    pub original_size: u64,
    pub compressed_image: Option<Artifact>,
    pub watermark_removed_image: Option<Artifact>,
    /// Why the compression step produced no artifact, if it ran and failed.
    pub compression_error: Option<String>,
    /// Why the watermark step produced no artifact, if it ran and failed.
    pub watermark_error: Option<String>,
    /// Why the job as a whole failed.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PhotoJob {
    pub fn new(id: Uuid, options: ProcessingOptions, original_key: String, original_size: u64) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            options,
            original_key,
            original_size,
            compressed_image: None,
            watermark_removed_image: None,
            compression_error: None,
            watermark_error: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, next: JobStatus) -> Result<(), JobStateError> {
        if !self.status.can_transition_to(next) {
            return Err(JobStateError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the job failed with a reason. Terminal jobs are left untouched.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), JobStateError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(reason.into());
        Ok(())
    }

    pub fn artifact(&self, kind: ArtifactKind) -> Option<&Artifact> {
        match kind {
            ArtifactKind::Compressed => self.compressed_image.as_ref(),
            ArtifactKind::WatermarkRemoved => self.watermark_removed_image.as_ref(),
        }
    }

    /// Attach a step output. Each artifact can be set once.
    pub fn attach_artifact(
        &mut self,
        kind: ArtifactKind,
        artifact: Artifact,
    ) -> Result<(), JobStateError> {
        let slot = match kind {
            ArtifactKind::Compressed => &mut self.compressed_image,
            ArtifactKind::WatermarkRemoved => &mut self.watermark_removed_image,
        };
        if slot.is_some() {
            return Err(JobStateError::ArtifactAlreadySet(kind));
        }
        *slot = Some(artifact);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn record_step_error(&mut self, kind: ArtifactKind, reason: impl Into<String>) {
        let reason = Some(reason.into());
        match kind {
            ArtifactKind::Compressed => self.compression_error = reason,
            ArtifactKind::WatermarkRemoved => self.watermark_error = reason,
        }
        self.updated_at = Utc::now();
    }

    pub fn compressed_size(&self) -> Option<u64> {
        self.compressed_image.as_ref().map(|a| a.size)
    }

    /// Percentage saved by compression, rounded to two decimals.
    pub fn compression_ratio(&self) -> f64 {
        match self.compressed_size() {
            Some(compressed) if self.original_size > 0 => {
                let ratio = (1.0 - compressed as f64 / self.original_size as f64) * 100.0;
                (ratio * 100.0).round() / 100.0
            }
            _ => 0.0,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JobStateError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Artifact {0} is already set")]
    ArtifactAlreadySet(ArtifactKind),
}
