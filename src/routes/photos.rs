use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::job::{ArtifactKind, ProcessingOptions};
use crate::models::photo::{BatchSubmitResponse, PhotoStatusResponse, SubmitResponse};
use crate::routes::ApiError;
use crate::services::photos;

const RECENT_PHOTOS_LIMIT: i64 = 50;
const BATCH_STATUS_LIMIT: usize = 100;

/// Uploaded images plus the processing options sent alongside them.
struct PhotoUpload {
    images: Vec<Vec<u8>>,
    options: ProcessingOptions,
}

/// Checkbox-style form values: present and truthy means enabled.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

async fn read_upload(mut multipart: Multipart) -> Result<PhotoUpload, ApiError> {
    let mut images = Vec::new();
    let mut options = ProcessingOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed upload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" | "images" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Unreadable image field: {}", e)))?;
                images.push(data.to_vec());
            }
            "compress_image" | "remove_watermark" | "compression_quality" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Unreadable field {}: {}", name, e)))?;
                match name.as_str() {
                    "compress_image" => options.compress = parse_flag(&value),
                    "remove_watermark" => options.remove_watermark = parse_flag(&value),
                    _ => {
                        options.compression_quality = value.trim().parse().map_err(|_| {
                            ApiError::bad_request("compression_quality must be an integer 1-100")
                        })?;
                    }
                }
            }
            _ => {}
        }
    }

    Ok(PhotoUpload { images, options })
}

/// POST /api/v1/photos: Upload a photo for processing.
pub async fn submit_photo(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let upload = read_upload(multipart).await?;
    let data = upload
        .images
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::bad_request("Missing image field"))?;

    let job = photos::submit_photo(&state, data, upload.options).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            photo_id: job.id,
            status: job.status,
            message: "Photo submitted for processing".to_string(),
        }),
    ))
}

/// POST /api/v1/photos/batch: Upload several photos with shared options.
pub async fn submit_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<BatchSubmitResponse>), ApiError> {
    let upload = read_upload(multipart).await?;
    let jobs = photos::submit_batch(&state, upload.images, upload.options).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchSubmitResponse {
            message: format!("{} photos submitted for processing", jobs.len()),
            photo_ids: jobs.iter().map(|job| job.id).collect(),
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct BatchStatusQuery {
    /// Comma separated photo ids.
    ids: String,
}

fn parse_ids(raw: &str) -> Result<Vec<Uuid>, ApiError> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<Uuid>()
                .map_err(|_| ApiError::bad_request(format!("Invalid photo id '{}'", id)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if ids.is_empty() {
        return Err(ApiError::bad_request("No photo ids given"));
    }
    if ids.len() > BATCH_STATUS_LIMIT {
        return Err(ApiError::bad_request(format!(
            "At most {} photo ids per request",
            BATCH_STATUS_LIMIT
        )));
    }
    Ok(ids)
}

/// GET /api/v1/photos/batch/status?ids=a,b,c: Status of a submitted batch.
pub async fn get_batch_status(
    State(state): State<AppState>,
    Query(query): Query<BatchStatusQuery>,
) -> Result<Json<Vec<PhotoStatusResponse>>, ApiError> {
    let ids = parse_ids(&query.ids)?;
    let jobs = photos::batch_status(&state, &ids).await?;
    Ok(Json(jobs.iter().map(PhotoStatusResponse::from).collect()))
}

/// GET /api/v1/photos: Most recent photo jobs.
pub async fn list_photos(
    State(state): State<AppState>,
) -> Result<Json<Vec<PhotoStatusResponse>>, ApiError> {
    let jobs = photos::recent_photos(&state, RECENT_PHOTOS_LIMIT).await?;
    Ok(Json(jobs.iter().map(PhotoStatusResponse::from).collect()))
}

/// GET /api/v1/photos/{photo_id}/status: Poll processing status.
pub async fn get_photo_status(
    State(state): State<AppState>,
    Path(photo_id): Path<Uuid>,
) -> Result<Json<PhotoStatusResponse>, ApiError> {
    let job = photos::photo_status(&state, photo_id).await?;
    Ok(Json(PhotoStatusResponse::from(&job)))
}

/// GET /api/v1/photos/{photo_id}/download/{kind}: Download the original or
/// a processed artifact.
pub async fn download_photo(
    State(state): State<AppState>,
    Path((photo_id, kind)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let artifact = match kind.as_str() {
        "original" => None,
        other => Some(
            other
                .parse::<ArtifactKind>()
                .map_err(|_| ApiError::not_found(format!("Unknown file kind '{}'", other)))?,
        ),
    };

    let job = photos::photo_status(&state, photo_id).await?;
    let data = photos::photo_bytes(&state, &job, artifact)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    let format = image::guess_format(&data).ok();
    let content_type = format
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");
    let extension = format
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("bin");
    let disposition = format!(
        "attachment; filename=\"{}_{}.{}\"",
        kind, photo_id, extension
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    ))
}
