pub mod analysis_task;
pub mod ingest_task;
pub mod rest;
pub mod state;

pub use rest::{
    analyze_document_handler, chat_history_handler, create_user_handler, delete_document_handler,
    get_document_handler, list_documents_handler, upload_document_handler,
};

use crate::error::ApiError;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use insight_core::domain::MAX_UPLOAD_BYTES;
use rest::ApiDoc;
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Room for the multipart framing around a maximum-size upload.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Builds the complete application router: the REST API under `/api`
/// plus the Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let allow_origin = match app_state.config.cors_allow_origin.as_deref() {
        Some(origin) => AllowOrigin::exact(HeaderValue::from_str(origin).map_err(|e| {
            ApiError::Internal(format!("Invalid CORS_ALLOW_ORIGIN '{}': {}", origin, e))
        })?),
        None => AllowOrigin::any(),
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let document_routes = Router::new()
        .route("/documents/upload", post(upload_document_handler))
        .route("/documents", get(list_documents_handler))
        .route(
            "/documents/{id}",
            get(get_document_handler).delete(delete_document_handler),
        )
        .route("/documents/{id}/analyze", post(analyze_document_handler))
        .route("/documents/{id}/chat-history", get(chat_history_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD_BYTES));

    let user_routes = Router::new().route("/users", post(create_user_handler));

    let api_router = Router::new()
        .nest("/api", document_routes.merge(user_routes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
