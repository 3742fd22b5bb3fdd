use std::sync::Arc;

use crate::db::JobRepository;
use crate::services::{queue::PhotoQueue, storage::PhotoStorage};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn JobRepository>,
    pub storage: Arc<dyn PhotoStorage>,
    pub queue: Arc<PhotoQueue>,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn JobRepository>,
        storage: Arc<dyn PhotoStorage>,
        queue: PhotoQueue,
    ) -> Self {
        Self {
            repository,
            storage,
            queue: Arc::new(queue),
        }
    }
}
