//! services/api/src/web/ingest_task.rs
//!
//! The document ingestion pipeline: validate the upload, store it, extract
//! its text, chunk it, and persist the document together with its chunks.
//! Also holds document removal, which undoes what ingestion stored.

use crate::{error::ApiError, web::state::AppState};
use chrono::Utc;
use insight_core::{
    chunk_text,
    domain::{Document, DocumentChunk, DocumentFormat, DEFAULT_CHUNK_SIZE, MAX_UPLOAD_BYTES},
    ports::PortError,
};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Validates a caller-supplied user id: it must be present and a UUID.
pub fn require_owner(raw: Option<&str>) -> Result<Uuid, ApiError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or(ApiError::MissingOwner)?;
    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidInput("user_id", raw.to_string()))
}

/// Turns an uploaded file into a stored `Document` plus its chunks.
///
/// Nothing touches storage until the owner, size, and format checks pass.
/// If extraction or persistence fails after the file was written, the file
/// is removed again before the error is returned.
pub async fn ingest_document(
    app_state: &AppState,
    owner: Option<&str>,
    data: &[u8],
    file_name: &str,
) -> Result<Document, ApiError> {
    let start_time = Instant::now();

    // --- 1. Validate the request ---
    let owner_id = require_owner(owner)?;

    if data.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::PayloadTooLarge {
            limit: MAX_UPLOAD_BYTES,
        });
    }

    let format = DocumentFormat::from_file_name(file_name).ok_or_else(|| {
        let ext = Path::new(file_name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| "(no extension)".to_string());
        ApiError::UnsupportedFormat(ext)
    })?;

    app_state.db.get_user(owner_id).await?;

    // --- 2. Write the upload to storage ---
    let document_id = Uuid::new_v4();
    let location = app_state.storage.location_for(document_id, format);
    app_state
        .storage
        .write(&location, data)
        .await
        .map_err(|e| ApiError::StorageWriteFailed(e.to_string()))?;
    info!(
        "Stored upload '{}' ({} bytes) for document {}.",
        file_name,
        data.len(),
        document_id
    );

    // --- 3. Extract and chunk the text ---
    let text = match app_state.extractor.extract(&location, format).await {
        Ok(text) => text,
        Err(e) => {
            error!("Text extraction failed for document {}: {}", document_id, e);
            discard_stored_file(app_state, &location).await;
            return Err(ApiError::ExtractionFailed(e.to_string()));
        }
    };

    let chunks: Vec<DocumentChunk> = chunk_text(&text, DEFAULT_CHUNK_SIZE)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, content)| DocumentChunk {
            id: Uuid::new_v4(),
            document_id,
            chunk_index,
            content,
        })
        .collect();
    let chunk_count = chunks.len();

    // --- 4. Persist the document and its chunks in one transaction ---
    let document = Document {
        id: document_id,
        user_id: owner_id,
        file_name: file_name.to_string(),
        storage_path: location.to_string_lossy().into_owned(),
        uploaded_at: Utc::now(),
    };

    match app_state.db.create_document_with_chunks(document, chunks).await {
        Ok(document) => {
            info!(
                "Ingested document {} with {} chunks in {:?}.",
                document.id,
                chunk_count,
                start_time.elapsed()
            );
            Ok(document)
        }
        Err(e) => {
            error!("Failed to persist document {}: {}", document_id, e);
            discard_stored_file(app_state, &location).await;
            Err(e.into())
        }
    }
}

/// Deletes a document (its chunks and chat history cascade) and then
/// removes the stored file. A file that cannot be removed is only logged.
pub async fn remove_document(app_state: &AppState, document_id: Uuid) -> Result<Document, ApiError> {
    let document = app_state.db.delete_document(document_id).await?;
    info!("Deleted document {}.", document_id);
    discard_stored_file(app_state, Path::new(&document.storage_path)).await;
    Ok(document)
}

async fn discard_stored_file(app_state: &AppState, location: &Path) {
    match app_state.storage.delete(location).await {
        Ok(()) => {}
        Err(PortError::NotFound(_)) => {
            warn!("Stored file {} was already gone.", location.display());
        }
        Err(e) => {
            warn!("Failed to remove stored file {}: {}", location.display(), e);
        }
    }
}
