//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        DbAdapter, FileStorageAdapter, HtmlReceiptAdapter, InMemoryStorageAdapter,
        NominatimGeocoder, SystemClock,
    },
    config::{Config, StorageBackend},
    error::ApiError,
    web::{rest::ApiDoc, router, state::AppState},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    Method,
};
use axum::Router;
use resource_board_core::{Board, StorageService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open Storage ---
    let storage = open_storage(&config.storage).await?;

    // --- 3. Initialize Service Adapters ---
    let geocoder = Arc::new(NominatimGeocoder::new(
        config.geocoder_url.clone(),
        config.geocoder_timeout,
        &config.geocoder_user_agent,
    )?);
    let receipts = Arc::new(HtmlReceiptAdapter::new());

    // --- 4. Load the Board & Build the Shared AppState ---
    let board = Board::load(
        storage,
        geocoder,
        receipts,
        Arc::new(SystemClock),
        config.device_location,
    )
    .await?;
    info!(
        listings = board.state().helpers.len(),
        pending = board.state().pickup_requests.iter().filter(|r| r.is_pending()).count(),
        logged_in = board.session().is_some(),
        "Board loaded."
    );
    let app_state = Arc::new(AppState::new(board));

    // --- 5. Create the Web Router ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Connects the configured storage backend, running migrations for Postgres.
async fn open_storage(backend: &StorageBackend) -> Result<Arc<dyn StorageService>, ApiError> {
    match backend {
        StorageBackend::File { data_dir } => {
            let adapter = FileStorageAdapter::new(data_dir)?;
            info!("Using board document at {}", adapter.path().display());
            Ok(Arc::new(adapter))
        }
        StorageBackend::Postgres { database_url } => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Ok(Arc::new(db_adapter))
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; nothing will survive a restart.");
            Ok(Arc::new(InMemoryStorageAdapter::new()))
        }
    }
}
