//! Test helper utilities: in-memory pipeline wiring, status polling and
//! misbehaving collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

use photo_pipeline::{
    app_state::AppState,
    db::{InMemoryJobRepository, JobRepository},
    models::job::{Artifact, ArtifactKind, PhotoJob, ProcessingOptions},
    processing::{
        EnhanceOptions, ProcessingEngine, ProcessingError, StandardEngine, WatermarkStrategy,
    },
    services::{
        orchestrator::{PhotoOrchestrator, PipelineConfig},
        queue::{PhotoQueue, QueueConfig},
        storage::{InMemoryStorage, PhotoStorage, StorageError},
    },
};

/// Everything a test needs to drive jobs without infrastructure.
pub struct Harness {
    pub repository: Arc<InMemoryJobRepository>,
    pub storage: Arc<dyn PhotoStorage>,
    pub orchestrator: Arc<PhotoOrchestrator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(Arc::new(StandardEngine), Arc::new(InMemoryStorage::new()), PipelineConfig::default())
    }

    pub fn with_engine(engine: Arc<dyn ProcessingEngine>) -> Self {
        Self::with(engine, Arc::new(InMemoryStorage::new()), PipelineConfig::default())
    }

    pub fn with(
        engine: Arc<dyn ProcessingEngine>,
        storage: Arc<dyn PhotoStorage>,
        config: PipelineConfig,
    ) -> Self {
        let repository = Arc::new(InMemoryJobRepository::new());
        let orchestrator = Arc::new(PhotoOrchestrator::new(
            repository.clone(),
            storage.clone(),
            engine,
            config,
        ));
        Self {
            repository,
            storage,
            orchestrator,
        }
    }

    /// Store an original and record a pending job for it, bypassing the queue.
    pub async fn pending_job(&self, data: &[u8], options: ProcessingOptions) -> PhotoJob {
        let id = Uuid::new_v4();
        let key = self.storage.write_original(id, data).await.expect("store original");
        let job = PhotoJob::new(id, options, key, data.len() as u64);
        self.repository.insert(&job).await.expect("insert job");
        job
    }

    pub fn app_state(&self, config: QueueConfig) -> AppState {
        let queue = PhotoQueue::start(self.orchestrator.clone(), config);
        AppState::new(self.repository.clone(), self.storage.clone(), queue)
    }
}

/// Poll the repository until the job reaches a terminal state (with timeout)
pub async fn wait_for_terminal(
    repository: &dyn JobRepository,
    job_id: Uuid,
    timeout_secs: u64,
) -> PhotoJob {
    let max_attempts = timeout_secs * 20; // Poll every 50ms

    for _ in 0..max_attempts {
        let job = repository.load(job_id).await.expect("load job");
        if job.status.is_terminal() {
            return job;
        }
        sleep(Duration::from_millis(50)).await;
    }

    panic!("Job {} did not finish within {} seconds", job_id, timeout_secs);
}

pub fn pipeline(strategy: WatermarkStrategy, enhance: bool) -> PipelineConfig {
    PipelineConfig {
        watermark_strategy: strategy,
        enhance: enhance.then(EnhanceOptions::all),
        ..PipelineConfig::default()
    }
}

/// Which engine call misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Compress,
    Watermark,
    Enhance,
    Resize,
    PanicInCompress,
}

/// Standard engine with one operation broken.
pub struct FaultyEngine {
    pub fault: Fault,
}

impl FaultyEngine {
    pub fn new(fault: Fault) -> Arc<Self> {
        Arc::new(Self { fault })
    }

    fn broken(&self, fault: Fault) -> Result<(), ProcessingError> {
        if fault == self.fault {
            return Err(ProcessingError::Decode(format!("injected {:?} failure", fault)));
        }
        Ok(())
    }
}

impl ProcessingEngine for FaultyEngine {
    fn probe(&self, data: &[u8]) -> Result<(u32, u32), ProcessingError> {
        StandardEngine.probe(data)
    }

    fn resize(&self, data: &[u8], max_width: u32, max_height: u32) -> Result<Vec<u8>, ProcessingError> {
        self.broken(Fault::Resize)?;
        StandardEngine.resize(data, max_width, max_height)
    }

    fn compress(&self, data: &[u8], quality: u8) -> Result<Vec<u8>, ProcessingError> {
        if self.fault == Fault::PanicInCompress {
            panic!("encoder crashed");
        }
        self.broken(Fault::Compress)?;
        StandardEngine.compress(data, quality)
    }

    fn remove_watermark(&self, data: &[u8], strategy: WatermarkStrategy) -> Result<Vec<u8>, ProcessingError> {
        self.broken(Fault::Watermark)?;
        StandardEngine.remove_watermark(data, strategy)
    }

    fn enhance(&self, data: &[u8], options: EnhanceOptions) -> Result<Vec<u8>, ProcessingError> {
        self.broken(Fault::Enhance)?;
        StandardEngine.enhance(data, options)
    }
}

/// In-memory storage whose artifact writes can be switched off.
#[derive(Default)]
pub struct FlakyStorage {
    inner: InMemoryStorage,
    pub fail_artifact_writes: AtomicBool,
}

impl FlakyStorage {
    pub fn failing_artifacts() -> Arc<Self> {
        let storage = Self::default();
        storage.fail_artifact_writes.store(true, Ordering::SeqCst);
        Arc::new(storage)
    }
}

#[async_trait]
impl PhotoStorage for FlakyStorage {
    async fn write_original(&self, job_id: Uuid, data: &[u8]) -> Result<String, StorageError> {
        self.inner.write_original(job_id, data).await
    }

    async fn read_original(&self, job_id: Uuid) -> Result<Vec<u8>, StorageError> {
        self.inner.read_original(job_id).await
    }

    async fn write_artifact(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
        data: &[u8],
    ) -> Result<Artifact, StorageError> {
        if self.fail_artifact_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.inner.write_artifact(job_id, kind, data).await
    }

    async fn read_artifact(&self, job_id: Uuid, kind: ArtifactKind) -> Result<Vec<u8>, StorageError> {
        self.inner.read_artifact(job_id, kind).await
    }
}
