//! services/api/src/bin/api.rs

use insight_api::{
    adapters::{
        db::DbAdapter, extractor::LocalTextExtractor, insight_llm::GeminiInsightAdapter,
        storage::LocalFileStorage,
    },
    config::Config,
    error::ApiError,
    web::{build_router, state::AppState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let storage = LocalFileStorage::new(&config.upload_dir);
    storage.ensure_root().await?;
    info!("Storing uploads in {}", config.upload_dir.display());

    let extractor = Arc::new(LocalTextExtractor::new(
        config.pdftotext_path.clone(),
        config.extraction_timeout,
    ));

    let insight_adapter = Arc::new(
        GeminiInsightAdapter::new(
            config.gemini_api_key.clone(),
            &config.gemini_base_url,
            &config.gemini_model,
            config.generation_timeout,
        )
        .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?
        .with_retry(config.generation_max_retries, Duration::from_millis(500)),
    );

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        storage: Arc::new(storage),
        extractor,
        insight_adapter,
    });

    // --- 5. Create the Web Router ---
    let app = build_router(app_state)?;

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
