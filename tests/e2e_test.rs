//! End-to-end HTTP tests against the router with in-memory infrastructure.
//!
//! Run with: cargo test --test e2e_test

mod fixtures;
mod helpers;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use fixtures::*;
use helpers::*;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use photo_pipeline::app_state::AppState;
use photo_pipeline::routes;
use photo_pipeline::services::queue::QueueConfig;

const BOUNDARY: &str = "photo-pipeline-test-boundary";

enum Part<'a> {
    File(&'a str, &'a [u8]),
    Text(&'a str, &'a str),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File(name, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.bin\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn app() -> (Harness, AppState, Router) {
    let harness = Harness::new();
    let state = harness.app_state(QueueConfig::default());
    let router = routes::router(state.clone());
    (harness, state, router)
}

#[tokio::test]
async fn test_health_check() {
    let (_harness, _state, app) = app();
    let (status, body) = send_json(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["database"]["status"], "ok");
}

#[tokio::test]
async fn test_submit_then_download_artifacts() {
    let (harness, _state, app) = app();
    let original = jpeg_photo();

    let (status, body) = send_json(
        &app,
        upload_request(
            "/api/v1/photos",
            &[
                Part::File("image", &original),
                Part::Text("compress_image", "on"),
                Part::Text("compression_quality", "80"),
                Part::Text("remove_watermark", "true"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "pending");
    let photo_id: Uuid = body["photo_id"].as_str().unwrap().parse().unwrap();

    wait_for_terminal(harness.repository.as_ref(), photo_id, 30).await;

    let (status, body) = send_json(&app, get(&format!("/api/v1/photos/{}/status", photo_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["has_compressed"], true);
    assert_eq!(body["has_watermark_removed"], true);
    assert_eq!(body["options"]["compression_quality"], 80);
    assert_eq!(body["original_size"], original.len() as u64);
    assert!(body["compression_ratio"].as_f64().unwrap() > 0.0);
    assert!(body.get("error").is_none());

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/photos/{}/download/compressed", photo_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"compressed_{}.jpg\"", photo_id).as_str()
    );

    let (status, bytes) = send(
        &app,
        get(&format!("/api/v1/photos/{}/download/original", photo_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, original);

    let (status, _) = send(
        &app,
        get(&format!("/api/v1/photos/{}/download/watermark_removed", photo_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_artifact_is_not_found() {
    let (harness, _state, app) = app();

    let (status, body) = send_json(
        &app,
        upload_request("/api/v1/photos", &[Part::File("image", &watermarked_jpeg())]),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let photo_id: Uuid = body["photo_id"].as_str().unwrap().parse().unwrap();
    wait_for_terminal(harness.repository.as_ref(), photo_id, 30).await;

    let (status, _) = send(
        &app,
        get(&format!("/api/v1/photos/{}/download/compressed", photo_id)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        get(&format!("/api/v1/photos/{}/download/thumbnail", photo_id)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_photo_is_not_found() {
    let (_harness, _state, app) = app();
    let (status, body) = send_json(
        &app,
        get(&format!("/api/v1/photos/{}/status", Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_rejected_uploads() {
    let (_harness, _state, app) = app();

    let (status, _) = send(
        &app,
        upload_request("/api/v1/photos", &[Part::Text("compress_image", "on")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        upload_request("/api/v1/photos", &[Part::File("image", NOT_AN_IMAGE)]),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let (status, _) = send(
        &app,
        upload_request(
            "/api/v1/photos",
            &[
                Part::File("image", &watermarked_jpeg()),
                Part::Text("compression_quality", "101"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        upload_request(
            "/api/v1/photos",
            &[
                Part::File("image", &watermarked_jpeg()),
                Part::Text("compression_quality", "high"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_batch_submit_and_list() {
    let (harness, _state, app) = app();
    let first = watermarked_jpeg();
    let second = watermarked_png();

    let (status, body) = send_json(
        &app,
        upload_request(
            "/api/v1/photos/batch",
            &[
                Part::File("images", &first),
                Part::File("images", &second),
                Part::Text("compress_image", "1"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let ids: Vec<Uuid> = body["photo_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|id| id.as_str().unwrap().parse().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);

    for id in &ids {
        wait_for_terminal(harness.repository.as_ref(), *id, 30).await;
    }

    let (status, body) = send_json(&app, get("/api/v1/photos")).await;
    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|photo| photo["status"] == "completed"));
    assert!(listed.iter().all(|photo| photo["has_compressed"] == true));

    let (status, _) = send(
        &app,
        upload_request("/api/v1/photos/batch", &[Part::Text("compress_image", "1")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submit_after_shutdown_is_unavailable() {
    let (_harness, state, app) = app();
    state.queue.shutdown().await;

    let (status, body) = send_json(
        &app,
        upload_request("/api/v1/photos", &[Part::File("image", &watermarked_jpeg())]),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("shut down"));
}

#[tokio::test]
async fn test_batch_status_reports_submitted_photos() {
    let (harness, _state, app) = app();
    let first = watermarked_jpeg();
    let second = jpeg_photo();

    let (status, body) = send_json(
        &app,
        upload_request(
            "/api/v1/photos/batch",
            &[
                Part::File("images", &first),
                Part::File("images", &second),
                Part::Text("remove_watermark", "on"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let ids: Vec<Uuid> = body["photo_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|id| id.as_str().unwrap().parse().unwrap())
        .collect();
    for id in &ids {
        wait_for_terminal(harness.repository.as_ref(), *id, 30).await;
    }

    // A photo outside the batch must not show up.
    let (status, _) = send(
        &app,
        upload_request("/api/v1/photos", &[Part::File("image", &watermarked_png())]),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let unknown = Uuid::new_v4();
    let uri = format!(
        "/api/v1/photos/batch/status?ids={},{},{}",
        ids[0], unknown, ids[1]
    );
    let (status, body) = send_json(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    let photos = body.as_array().unwrap();
    assert_eq!(photos.len(), 2);
    for photo in photos {
        let id: Uuid = photo["photo_id"].as_str().unwrap().parse().unwrap();
        assert!(ids.contains(&id));
        assert_eq!(photo["status"], "completed");
        assert_eq!(photo["has_watermark_removed"], true);
    }

    let (status, _) = send(&app, get("/api/v1/photos/batch/status?ids=nope")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, get("/api/v1/photos/batch/status")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
