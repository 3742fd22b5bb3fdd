use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use photo_pipeline::app_state::AppState;
use photo_pipeline::config::AppConfig;
use photo_pipeline::db::{self, InMemoryJobRepository, JobRepository, PgJobRepository};
use photo_pipeline::processing::StandardEngine;
use photo_pipeline::routes;
use photo_pipeline::services::orchestrator::PhotoOrchestrator;
use photo_pipeline::services::queue::PhotoQueue;
use photo_pipeline::services::storage::{LocalStorage, PhotoStorage};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing photo-pipeline server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe_metrics();

    let repository: Arc<dyn JobRepository> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL database");
            let pool = db::init_pool(url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Running database migrations");
            db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");

            Arc::new(PgJobRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, photo jobs will be kept in memory");
            Arc::new(InMemoryJobRepository::new())
        }
    };

    tracing::info!(media_root = %config.media_root, "Using local photo storage");
    let storage: Arc<dyn PhotoStorage> = Arc::new(LocalStorage::new(&config.media_root));

    let pipeline = config.pipeline();
    tracing::info!(
        watermark_strategy = %pipeline.watermark_strategy,
        resize = pipeline.resize.is_some(),
        enhance = pipeline.enhance.is_some(),
        "Photo pipeline configured"
    );
    let orchestrator = Arc::new(PhotoOrchestrator::new(
        Arc::clone(&repository),
        Arc::clone(&storage),
        Arc::new(StandardEngine),
        pipeline,
    ));
    let queue = PhotoQueue::start(orchestrator, config.queue());

    let state = AppState::new(repository, storage, queue);
    let queue = Arc::clone(&state.queue);

    let app = routes::router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Draining photo queue");
    queue.shutdown().await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
