mod app_state;
mod config;
mod db;
mod models;
mod routes;
mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use services::{
    admission::AdmissionController,
    enrichment::EnrichmentClient,
    orchestrator::Orchestrator,
    queue::PriorityQueue,
    worker::ProcessingWorker,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing image-summary-server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!(
        "submissions_accepted_total",
        "Total submissions admitted to the queue"
    );
    metrics::describe_counter!(
        "submissions_rejected_total",
        "Total submissions rejected at admission"
    );
    metrics::describe_counter!(
        "summaries_processed_total",
        "Total summary records persisted"
    );
    metrics::describe_counter!(
        "summaries_lost_total",
        "Accepted items dropped without a persisted record"
    );
    metrics::describe_histogram!(
        "summary_processing_seconds",
        "Time to enrich and persist one queued item"
    );
    metrics::describe_gauge!("queue_depth", "Items currently waiting in the queue");

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize the in-memory priority queue
    let queue = Arc::new(PriorityQueue::new());

    // Initialize model server clients
    tracing::info!("Initializing enrichment model server clients");
    let enrichment = Arc::new(
        EnrichmentClient::new(
            config.image_captioning_url.clone(),
            config.object_detection_url.clone(),
            config.text_summarization_url.clone(),
            Duration::from_secs(config.enrichment_timeout_secs),
        )
        .expect("Failed to initialize enrichment client"),
    );

    // Admission controller shares the queue with the worker
    let admission = AdmissionController::new(
        db_pool.clone(),
        Arc::clone(&queue),
        config.max_summaries_per_day,
        config.max_participation_per_day,
    );

    // Start the background processing worker
    let shutdown = CancellationToken::new();
    let worker = ProcessingWorker::new(
        Arc::clone(&queue),
        Orchestrator::new(Arc::clone(&enrichment), db_pool.clone()),
        db_pool.clone(),
        Duration::from_millis(config.worker_poll_interval_ms),
    );
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    // Create shared application state
    let state = AppState::new(db_pool, queue, admission);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/upload_image", post(routes::upload::upload_image))
        .route(
            "/api/summaries/{customer_id}",
            get(routes::summaries::customer_summaries),
        )
        .route(
            "/api/summary/{customer_id}/{filename}",
            get(routes::summaries::summary_by_filename),
        )
        .route("/api/admin/queue_status", get(routes::admin::queue_status))
        .route(
            "/api/admin/all_queued_items",
            get(routes::admin::queued_items_snapshot),
        )
        .route(
            "/api/admin/all_summaries",
            get(routes::summaries::all_summaries),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024)); // 10 MB limit

    tracing::info!("Starting image-summary-server on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move {
                tokio::signal::ctrl_c()
                    .await
                    .expect("Failed to listen for shutdown signal");
                tracing::info!("Shutdown signal received");
                shutdown.cancel();
            }
        })
        .await
        .expect("Server error");

    // Let the worker finish its in-flight item before exiting.
    shutdown.cancel();
    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "Worker task ended abnormally");
    }
}
