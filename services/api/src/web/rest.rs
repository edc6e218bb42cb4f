//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::{
    error::ApiError,
    web::{
        analysis_task::analyze_document,
        ingest_task::{ingest_document, remove_document, require_owner},
        state::AppState,
    },
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use insight_core::domain::{ChatMessage, Document, User, MAX_UPLOAD_BYTES};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_user_handler,
        upload_document_handler,
        list_documents_handler,
        get_document_handler,
        delete_document_handler,
        analyze_document_handler,
        chat_history_handler,
    ),
    components(
        schemas(
            CreateUserRequest,
            UserResponse,
            DocumentResponse,
            AnalyzeRequest,
            AnalyzeResponse,
            ChatMessageResponse,
        )
    ),
    tags(
        (name = "Document Insight API", description = "Upload documents and ask questions about them.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub email: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// A stored document, as returned by upload, list, and get.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub storage_path: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            user_id: doc.user_id,
            file_name: doc.file_name,
            storage_path: doc.storage_path,
            uploaded_at: doc.uploaded_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    pub query: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AnalyzeResponse {
    pub response: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChatMessageResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub user_id: Uuid,
    /// Either `user` or `assistant`.
    pub message_type: String,
    pub message_content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<ChatMessage> for ChatMessageResponse {
    fn from(msg: ChatMessage) -> Self {
        Self {
            id: msg.id,
            document_id: msg.document_id,
            user_id: msg.user_id,
            message_type: msg.message_type.as_str().to_string(),
            message_content: msg.content,
            timestamp: msg.timestamp,
        }
    }
}

#[derive(Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Register a new user.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Email missing"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_user_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim();
    if email.is_empty() {
        return Err(ApiError::InvalidInput("email", "must not be empty".to_string()));
    }
    let user = app_state.db.create_user(email).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Upload a document.
///
/// Accepts a multipart/form-data request with a `file` part and a `user_id` part.
#[utoipa::path(
    post,
    path = "/api/documents/upload",
    request_body(content_type = "multipart/form-data", description = "`file` (PDF, TXT or DOCX) and `user_id`."),
    responses(
        (status = 201, description = "Document ingested", body = DocumentResponse),
        (status = 400, description = "Missing user, missing file, or unsupported format"),
        (status = 404, description = "Unknown user"),
        (status = 413, description = "File larger than 10 MiB"),
        (status = 500, description = "Storage, extraction, or persistence failure")
    )
)]
pub async fn upload_document_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut user_id: Option<String> = None;
    let mut upload: Option<(String, bytes::Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("user_id") => {
                user_id = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::InvalidInput("file", "missing file name".to_string()))?;
                let data = field.bytes().await.map_err(multipart_error)?;
                upload = Some((file_name, data));
            }
            _ => {}
        }
    }

    let (file_name, data) =
        upload.ok_or_else(|| ApiError::InvalidInput("file", "multipart form must include a file".to_string()))?;

    let document = ingest_document(&app_state, user_id.as_deref(), &data, &file_name).await?;
    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge {
            limit: MAX_UPLOAD_BYTES,
        }
    } else {
        ApiError::InvalidInput("multipart body", e.body_text())
    }
}

/// List a user's documents, newest first.
#[utoipa::path(
    get,
    path = "/api/documents",
    params(("user_id" = Uuid, Query, description = "Owner of the documents.")),
    responses(
        (status = 200, description = "Documents", body = [DocumentResponse]),
        (status = 400, description = "Missing user id")
    )
)]
pub async fn list_documents_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<UserQuery>,
) -> Result<Json<Vec<DocumentResponse>>, ApiError> {
    let user_id = require_owner(params.user_id.as_deref())?;
    let documents = app_state.db.list_documents_for_user(user_id).await?;
    Ok(Json(documents.into_iter().map(DocumentResponse::from).collect()))
}

/// Fetch a single document.
#[utoipa::path(
    get,
    path = "/api/documents/{id}",
    params(("id" = Uuid, Path, description = "Document id.")),
    responses(
        (status = 200, description = "Document", body = DocumentResponse),
        (status = 404, description = "Document not found")
    )
)]
pub async fn get_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let document = app_state.db.get_document(document_id).await?;
    Ok(Json(document.into()))
}

/// Delete a document with its chunks, chat history, and stored file.
#[utoipa::path(
    delete,
    path = "/api/documents/{id}",
    params(("id" = Uuid, Path, description = "Document id.")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn delete_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path(document_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    remove_document(&app_state, document_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Ask a question about a document.
#[utoipa::path(
    post,
    path = "/api/documents/{id}/analyze",
    params(
        ("id" = Uuid, Path, description = "Document id."),
        ("user_id" = Uuid, Query, description = "User asking the question.")
    ),
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Generated answer", body = AnalyzeResponse),
        (status = 400, description = "Missing user id"),
        (status = 404, description = "Unknown user or document"),
        (status = 502, description = "Generation service failed")
    )
)]
pub async fn analyze_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path(document_id): Path<Uuid>,
    Query(params): Query<UserQuery>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let response =
        analyze_document(&app_state, document_id, params.user_id.as_deref(), &req.query).await?;
    Ok(Json(AnalyzeResponse { response }))
}

/// The question/answer history of a document, oldest first.
#[utoipa::path(
    get,
    path = "/api/documents/{id}/chat-history",
    params(("id" = Uuid, Path, description = "Document id.")),
    responses(
        (status = 200, description = "Chat history", body = [ChatMessageResponse])
    )
)]
pub async fn chat_history_handler(
    State(app_state): State<Arc<AppState>>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessageResponse>>, ApiError> {
    let messages = app_state.db.get_chat_history(document_id).await?;
    Ok(Json(messages.into_iter().map(ChatMessageResponse::from).collect()))
}
