//! # Compatibility API Server
//!
//! HTTP front door for the bathroom-fixture compatibility service, built
//! with Axum. Endpoints:
//!
//! - `POST /webhook?key=<secret>`: vendor feed-ready notifications,
//!   queued for the background worker
//! - `GET /status?sync_id=<id>` / `GET /status?limit=N`: sync records
//! - `GET /compatible/{sku}`: compatibility lookup for one product
//! - `GET /health`, `GET /ready`: liveness and readiness
//! - `/swagger-ui`: interactive API docs
//!
//! On startup the server runs migrations, loads the current feed workbook
//! into the in-memory snapshot (when present on disk), and spawns the
//! sync worker that drains the webhook queue and back-fills the
//! compatibility graph.

use axum::{http::StatusCode, response::IntoResponse, Json, Router};
use compat_catalog::{
    feed::{FeedLoader, SnapshotHolder},
    overrides::OverrideStore,
    product::PostgresCatalogStore,
    query::{LookupService, QueryCache},
    sync::SyncService,
    webhook::{FeedDownloader, FeedSyncPipeline, JobQueue, SyncWorker},
};
use compat_core::{Config, DatabasePool};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api_middleware;
mod error;
mod handlers;
mod health;
mod state;

use crate::{
    handlers::{compatible, status, webhook},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting compatibility server...");

    let config = Config::load()?;
    info!("Configuration loaded successfully");

    let db = DatabasePool::new(config.database.clone()).await?;
    info!("Database pool initialized");

    run_migrations(&db).await?;
    info!("Database migrations completed");

    // Shared domain services.
    let store = Arc::new(PostgresCatalogStore::new(db.pool.clone()));
    let snapshots = Arc::new(SnapshotHolder::empty());
    let cache = Arc::new(QueryCache::new());
    let overrides = Arc::new(OverrideStore::new(
        config.data.whitelist_path(),
        config.data.blacklist_path(),
    ));

    // Load the current feed into memory when one is already on disk; a
    // missing file just means lookups serve stored edges until the first
    // sync lands.
    let feed_path = config.data.feed_path();
    if feed_path.exists() {
        match FeedLoader::load_path(&feed_path) {
            Ok(snapshot) => snapshots.swap(snapshot),
            Err(e) => warn!("Could not load feed {}: {}", feed_path.display(), e),
        }
    } else {
        warn!("No feed file at {}; waiting for first sync", feed_path.display());
    }

    let lookup = Arc::new(LookupService::new(
        store.clone(),
        snapshots.clone(),
        overrides.clone(),
        cache.clone(),
    ));
    let sync_service = Arc::new(SyncService::new(
        store.clone(),
        snapshots.clone(),
        cache.clone(),
    ));

    // Background worker with its own queue handle; the webhook handler
    // and the worker serialize through the queue file's atomic rename.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let downloader = FeedDownloader::new(
        config.webhook.download_timeout_secs,
        config.webhook.max_download_bytes,
    )?;
    let pipeline = Arc::new(FeedSyncPipeline::new(
        sync_service.clone(),
        downloader,
        config.data.clone(),
    ));
    let worker = SyncWorker::new(
        store.clone(),
        sync_service.clone(),
        JobQueue::new(config.data.queue_path()),
        pipeline,
        config.worker.clone(),
        shutdown_rx,
    );
    let worker_handle = worker.spawn();
    info!("Sync worker spawned");

    let app_state = AppState {
        config: config.clone(),
        db,
        store,
        lookup,
        queue: Arc::new(JobQueue::new(config.data.queue_path())),
    };

    let app = create_app(app_state);

    let addr = std::net::SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the worker between iterations and wait for it.
    let _ = shutdown_tx.send(true);
    let _ = worker_handle.await;

    info!("Server shutdown complete");
    Ok(())
}

fn create_app(state: AppState) -> Router {
    #[derive(OpenApi)]
    #[openapi(
        paths(
            health::health_check,
            health::readiness_check,
            handlers::webhook::receive_webhook,
            handlers::status::sync_status,
            handlers::compatible::compatible_products,
        ),
        tags(
            (name = "health", description = "Health check endpoints"),
            (name = "ingestion", description = "Feed webhook and sync status"),
            (name = "compatibility", description = "Product compatibility lookups"),
        )
    )]
    struct ApiDoc;

    Router::new()
        .route("/webhook", axum::routing::post(webhook::receive_webhook))
        .route("/status", axum::routing::get(status::sync_status))
        .route(
            "/compatible/:sku",
            axum::routing::get(compatible::compatible_products),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", axum::routing::get(health::health_check))
        .route("/ready", axum::routing::get(health::readiness_check))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(
                    api_middleware::security_headers::security_headers_middleware,
                ))
                .layer(axum::middleware::from_fn(
                    api_middleware::request_id::request_id_middleware,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
        .fallback(handler_404)
}

async fn handler_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "Resource not found"
        })),
    )
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "compat_api=debug,compat_catalog=debug,compat_core=debug,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_migrations(db: &DatabasePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");
    let migrator = sqlx::migrate!("../../migrations");
    migrator.run(&db.pool).await?;
    info!("Migrations completed successfully");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
