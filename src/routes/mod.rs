use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::app_state::AppState;
use crate::db::RepositoryError;
use crate::services::photos::SubmitError;
use crate::services::queue::QueueError;
use crate::services::storage::StorageError;

pub mod health;
pub mod metrics;
pub mod photos;

/// API routes bound to the application state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/api/v1/photos",
            post(photos::submit_photo).get(photos::list_photos),
        )
        .route("/api/v1/photos/batch", post(photos::submit_batch))
        .route("/api/v1/photos/batch/status", get(photos::get_batch_status))
        .route("/api/v1/photos/{photo_id}/status", get(photos::get_photo_status))
        .route(
            "/api/v1/photos/{photo_id}/download/{kind}",
            get(photos::download_photo),
        )
        .with_state(state)
}

/// Error body returned by the photo API.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(id) => Self::not_found(format!("Photo {} not found", id)),
            other => {
                tracing::error!(error = %other, "Job repository failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Job store unavailable")
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => Self::not_found("File not found"),
            other => {
                tracing::error!(error = %other, "Photo storage failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Photo storage unavailable")
            }
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::InvalidOptions(_) | SubmitError::NoImages => Self::bad_request(e.to_string()),
            SubmitError::UnsupportedImage(_) => {
                Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string())
            }
            SubmitError::Queue(QueueError::Full | QueueError::Closed) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            SubmitError::Storage(e) => e.into(),
            SubmitError::Repository(e) => e.into(),
            SubmitError::State(e) => {
                tracing::error!(error = %e, "Submitted job in unexpected state");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Submission failed")
            }
        }
    }
}
