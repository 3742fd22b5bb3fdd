//! In-process job queue: a bounded channel feeding a semaphore-limited
//! worker pool that runs the orchestrator for each submitted job.
//!
//! [`PhotoQueue::shutdown`] stops intake, lets queued jobs drain and waits
//! for every in-flight run to finish.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::services::orchestrator::PhotoOrchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub max_workers: usize,
    /// Jobs that may wait for a worker before submissions are refused.
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            capacity: 256,
        }
    }
}

pub struct PhotoQueue {
    sender: Mutex<Option<mpsc::Sender<Uuid>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl PhotoQueue {
    /// Spawn the dispatcher. Must be called inside a tokio runtime.
    pub fn start(orchestrator: Arc<PhotoOrchestrator>, config: QueueConfig) -> Self {
        let max_workers = config.max_workers.max(1);
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));

        tracing::info!(
            max_workers,
            capacity = config.capacity,
            "Starting photo worker pool"
        );

        let dispatcher = tokio::spawn(Self::dispatch(receiver, orchestrator, max_workers));

        Self {
            sender: Mutex::new(Some(sender)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    fn sender(&self) -> Result<mpsc::Sender<Uuid>, QueueError> {
        let guard = self.sender.lock().map_err(|_| QueueError::Closed)?;
        guard.clone().ok_or(QueueError::Closed)
    }

    /// Hand a pending job to the pool without waiting for it to run.
    pub fn submit(&self, job_id: Uuid) -> Result<(), QueueError> {
        let sender = self.sender()?;

        // Counted before sending so the dispatcher never decrements first.
        metrics::gauge!("photo_queue_depth").increment(1.0);
        match sender.try_send(job_id) {
            Ok(()) => {
                tracing::debug!(job_id = %job_id, "Photo job queued");
                Ok(())
            }
            Err(e) => {
                metrics::gauge!("photo_queue_depth").decrement(1.0);
                Err(e.into())
            }
        }
    }

    /// Claim `count` queue slots at once, or none of them.
    ///
    /// Slots are held until sent through the [`Reservation`] or dropped.
    pub fn reserve(&self, count: usize) -> Result<Reservation, QueueError> {
        let sender = self.sender()?;
        let permits = (0..count)
            .map(|_| sender.clone().try_reserve_owned().map_err(QueueError::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Reservation { permits })
    }

    /// Refuse new submissions, then wait until queued and running jobs finish.
    pub async fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }

        let dispatcher = match self.dispatcher.lock() {
            Ok(mut handle) => handle.take(),
            Err(_) => None,
        };

        if let Some(handle) = dispatcher {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Photo queue dispatcher crashed");
            }
        }
    }

    async fn dispatch(
        mut receiver: mpsc::Receiver<Uuid>,
        orchestrator: Arc<PhotoOrchestrator>,
        max_workers: usize,
    ) {
        let semaphore = Arc::new(Semaphore::new(max_workers));

        while let Some(job_id) = receiver.recv().await {
            metrics::gauge!("photo_queue_depth").decrement(1.0);

            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                let _permit = permit;
                match orchestrator.run(job_id).await {
                    Ok(status) => tracing::debug!(job_id = %job_id, status = %status, "Photo job finished"),
                    Err(e) => tracing::error!(job_id = %job_id, error = %e, "Photo job could not be run"),
                }
            });
        }

        // All permits back means no run is still in flight.
        if semaphore.acquire_many(max_workers as u32).await.is_ok() {
            tracing::info!("Photo worker pool drained");
        }
    }
}

/// Queue slots claimed ahead of job creation.
pub struct Reservation {
    permits: Vec<mpsc::OwnedPermit<Uuid>>,
}

impl Reservation {
    /// Queue one job per reserved slot. Unused slots are released.
    pub fn send_all(self, job_ids: impl IntoIterator<Item = Uuid>) {
        for (permit, job_id) in self.permits.into_iter().zip(job_ids) {
            metrics::gauge!("photo_queue_depth").increment(1.0);
            permit.send(job_id);
            tracing::debug!(job_id = %job_id, "Photo job queued");
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Photo queue is full")]
    Full,

    #[error("Photo queue is shut down")]
    Closed,
}

impl<T> From<TrySendError<T>> for QueueError {
    fn from(e: TrySendError<T>) -> Self {
        match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Closed(_) => QueueError::Closed,
        }
    }
}
