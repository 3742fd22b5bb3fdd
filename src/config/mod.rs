use serde::Deserialize;

use crate::processing::{EnhanceOptions, WatermarkStrategy};
use crate::services::orchestrator::{PipelineConfig, ResizeBounds};
use crate::services::queue::QueueConfig;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string. Jobs are kept in memory when unset.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Directory holding originals and processed artifacts
    #[serde(default = "default_media_root")]
    pub media_root: String,

    /// Concurrent processing runs
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Jobs allowed to wait for a worker
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default)]
    pub watermark_strategy: WatermarkStrategy,

    /// Downscale oversized originals before processing
    #[serde(default = "default_true")]
    pub resize_before_processing: bool,

    #[serde(default = "default_resize_max_width")]
    pub resize_max_width: u32,

    #[serde(default = "default_resize_max_height")]
    pub resize_max_height: u32,

    /// Run contrast/sharpness/denoise on watermark-removed output
    #[serde(default)]
    pub enhance_output: bool,

    /// Request body limit for uploads, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_media_root() -> String {
    "./media".to_string()
}

fn default_max_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    256
}

fn default_true() -> bool {
    true
}

fn default_resize_max_width() -> u32 {
    1920
}

fn default_resize_max_height() -> u32 {
    1080
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            watermark_strategy: self.watermark_strategy,
            resize: self.resize_before_processing.then_some(ResizeBounds {
                max_width: self.resize_max_width,
                max_height: self.resize_max_height,
            }),
            enhance: self.enhance_output.then(EnhanceOptions::all),
        }
    }

    pub fn queue(&self) -> QueueConfig {
        QueueConfig {
            max_workers: self.max_workers,
            capacity: self.queue_capacity,
        }
    }
}
