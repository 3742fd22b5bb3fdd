//! Drives a single photo job through its processing steps.
//!
//! Steps run strictly in order: resize (implicit), compression, watermark
//! removal, optional enhancement. A step that fails inside an engine only
//! loses its own artifact; storage, persistence and engine crashes fail the
//! whole job.

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::db::{JobRepository, RepositoryError};
use crate::models::job::{ArtifactKind, JobStateError, JobStatus, PhotoJob};
use crate::processing::compression::calculate_savings;
use crate::processing::resize::{target_dimensions, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH};
use crate::processing::{EnhanceOptions, ProcessingEngine, ProcessingError, StepOutcome, WatermarkStrategy};
use crate::services::storage::{PhotoStorage, StorageError};

/// Bounds for the implicit resize pre-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeBounds {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ResizeBounds {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub watermark_strategy: WatermarkStrategy,
    /// `None` disables the resize pre-step.
    pub resize: Option<ResizeBounds>,
    /// `Some` runs enhancement on the watermark-removed output.
    pub enhance: Option<EnhanceOptions>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            watermark_strategy: WatermarkStrategy::default(),
            resize: Some(ResizeBounds::default()),
            enhance: None,
        }
    }
}

pub struct PhotoOrchestrator {
    repository: Arc<dyn JobRepository>,
    storage: Arc<dyn PhotoStorage>,
    engine: Arc<dyn ProcessingEngine>,
    config: PipelineConfig,
}

impl PhotoOrchestrator {
    pub fn new(
        repository: Arc<dyn JobRepository>,
        storage: Arc<dyn PhotoStorage>,
        engine: Arc<dyn ProcessingEngine>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            repository,
            storage,
            engine,
            config,
        }
    }

    /// Run a pending job to a terminal state and persist it.
    ///
    /// Returns the terminal status that was recorded. An `Err` means the job
    /// could not be started or its final state could not be stored.
    #[tracing::instrument(skip_all, fields(job_id = %job_id))]
    pub async fn run(&self, job_id: Uuid) -> Result<JobStatus, OrchestratorError> {
        let started = Instant::now();

        let mut job = self.repository.load(job_id).await?;
        job.transition(JobStatus::Processing)?;
        self.repository.save(&job).await?;

        tracing::info!(
            compress = job.options.compress,
            quality = job.options.compression_quality,
            remove_watermark = job.options.remove_watermark,
            "Processing photo"
        );

        let outcome = match self.process(&mut job).await {
            Ok(()) => {
                let mut completed = job.clone();
                completed.transition(JobStatus::Completed)?;
                match self.repository.save(&completed).await {
                    Ok(()) => {
                        job = completed;
                        Ok(JobStatus::Completed)
                    }
                    Err(e) => Err(OrchestratorError::from(e)),
                }
            }
            Err(e) => Err(e),
        };

        let status = match outcome {
            Ok(status) => status,
            Err(fault) => {
                tracing::error!(error = %fault, "Photo processing failed");
                job.fail(fault.to_string())?;
                self.repository.save(&job).await?;
                JobStatus::Failed
            }
        };

        let elapsed = started.elapsed();
        metrics::histogram!("photo_processing_seconds").record(elapsed.as_secs_f64());
        match status {
            JobStatus::Completed => {
                metrics::counter!("photo_jobs_completed_total").increment(1);
                tracing::info!(
                    duration_ms = elapsed.as_millis() as u64,
                    has_compressed = job.compressed_image.is_some(),
                    has_watermark_removed = job.watermark_removed_image.is_some(),
                    "Photo processing completed"
                );
            }
            _ => metrics::counter!("photo_jobs_failed_total").increment(1),
        }

        Ok(status)
    }

    async fn process(&self, job: &mut PhotoJob) -> Result<(), OrchestratorError> {
        let original = Arc::new(self.storage.read_original(job.id).await?);

        let data = Arc::clone(&original);
        let (width, height) = self
            .run_engine(move |engine| engine.probe(&data))
            .await?
            .map_err(OrchestratorError::UnreadableSource)?;

        let source = self.resize_step(job.id, original, width, height).await?;

        let outcome = if job.options.compress {
            let data = Arc::clone(&source);
            let quality = job.options.compression_quality;
            StepOutcome::from_result(self.run_engine(move |engine| engine.compress(&data, quality)).await?)
        } else {
            StepOutcome::Skipped
        };
        let compressed = self.store_outcome(job, ArtifactKind::Compressed, outcome).await?;
        if let Some(size) = job.compressed_size() {
            tracing::info!(
                original_size = job.original_size,
                compressed_size = size,
                savings_pct = calculate_savings(job.original_size, size),
                "Compression step stored"
            );
        }

        let outcome = if job.options.remove_watermark {
            let input = compressed.unwrap_or(source);
            let strategy = self.config.watermark_strategy;
            let removed = self
                .run_engine(move |engine| engine.remove_watermark(&input, strategy))
                .await?;
            match (removed, self.config.enhance) {
                (Ok(bytes), Some(options)) => StepOutcome::Produced(self.enhance_step(bytes, options).await?),
                (result, _) => StepOutcome::from_result(result),
            }
        } else {
            StepOutcome::Skipped
        };
        self.store_outcome(job, ArtifactKind::WatermarkRemoved, outcome).await?;

        Ok(())
    }

    /// Downscale oversized originals. Falls back to the original bytes when
    /// resizing fails.
    async fn resize_step(
        &self,
        job_id: Uuid,
        original: Arc<Vec<u8>>,
        width: u32,
        height: u32,
    ) -> Result<Arc<Vec<u8>>, OrchestratorError> {
        let Some(bounds) = self.config.resize else {
            return Ok(original);
        };
        if target_dimensions(width, height, bounds.max_width, bounds.max_height).is_none() {
            return Ok(original);
        }

        let data = Arc::clone(&original);
        match self
            .run_engine(move |engine| engine.resize(&data, bounds.max_width, bounds.max_height))
            .await?
        {
            Ok(resized) => {
                tracing::debug!(job_id = %job_id, width, height, "Resized oversized original");
                Ok(Arc::new(resized))
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Resize failed, using original");
                metrics::counter!("photo_step_failures_total", "step" => "resize").increment(1);
                Ok(original)
            }
        }
    }

    /// Enhance the watermark-removed output, keeping it unenhanced on failure.
    async fn enhance_step(
        &self,
        data: Vec<u8>,
        options: EnhanceOptions,
    ) -> Result<Vec<u8>, OrchestratorError> {
        let data = Arc::new(data);
        let input = Arc::clone(&data);
        match self.run_engine(move |engine| engine.enhance(&input, options)).await? {
            Ok(enhanced) => Ok(enhanced),
            Err(e) => {
                tracing::warn!(error = %e, "Enhancement failed, keeping unenhanced output");
                metrics::counter!("photo_step_failures_total", "step" => "enhance").increment(1);
                Ok(Arc::try_unwrap(data).unwrap_or_else(|shared| shared.as_ref().clone()))
            }
        }
    }

    /// Persist a produced artifact on the job, or record why there is none.
    async fn store_outcome(
        &self,
        job: &mut PhotoJob,
        kind: ArtifactKind,
        outcome: StepOutcome,
    ) -> Result<Option<Arc<Vec<u8>>>, OrchestratorError> {
        match outcome {
            StepOutcome::Produced(bytes) => {
                let artifact = self.storage.write_artifact(job.id, kind, &bytes).await?;
                tracing::debug!(step = %kind, key = %artifact.key, size = artifact.size, "Stored artifact");
                job.attach_artifact(kind, artifact)?;
                Ok(Some(Arc::new(bytes)))
            }
            StepOutcome::Skipped => {
                tracing::debug!(step = %kind, "Step not requested");
                Ok(None)
            }
            StepOutcome::Failed(e) => {
                tracing::warn!(step = %kind, error = %e, "Step failed, continuing without artifact");
                metrics::counter!("photo_step_failures_total", "step" => kind.as_ref().to_string())
                    .increment(1);
                job.record_step_error(kind, e.to_string());
                Ok(None)
            }
        }
    }

    /// Run an engine call on the blocking pool. The outer error is a crashed
    /// or cancelled task; the inner one is the engine's own failure.
    async fn run_engine<T, F>(&self, f: F) -> Result<Result<T, ProcessingError>, OrchestratorError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ProcessingEngine) -> Result<T, ProcessingError> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || f(engine.as_ref()))
            .await
            .map_err(|e| OrchestratorError::Task(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Storage unavailable: {0}")]
    Storage(#[from] StorageError),

    #[error("Job persistence failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    State(#[from] JobStateError),

    #[error("Original image is unreadable: {0}")]
    UnreadableSource(ProcessingError),

    #[error("Processing task crashed: {0}")]
    Task(String),
}
