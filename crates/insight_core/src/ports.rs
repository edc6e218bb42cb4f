//! crates/insight_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{ChatMessage, Document, DocumentChunk, DocumentFormat, User};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn create_user(&self, email: &str) -> PortResult<User>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    // --- Document Management ---

    /// Inserts the document and all of its chunks atomically.
    async fn create_document_with_chunks(
        &self,
        document: Document,
        chunks: Vec<DocumentChunk>,
    ) -> PortResult<Document>;

    /// Newest first; ties broken by id so repeated listings are identical.
    async fn list_documents_for_user(&self, user_id: Uuid) -> PortResult<Vec<Document>>;

    async fn get_document(&self, document_id: Uuid) -> PortResult<Document>;

    /// Removes the document row (cascading chunks and chat history) and
    /// returns it so the caller can clean up the stored file.
    async fn delete_document(&self, document_id: Uuid) -> PortResult<Document>;

    /// Chunks ordered by `chunk_index`.
    async fn get_chunks_for_document(&self, document_id: Uuid) -> PortResult<Vec<DocumentChunk>>;

    // --- Chat History ---
    async fn save_chat_message(&self, message: ChatMessage) -> PortResult<()>;

    /// Ordered by timestamp, user messages before assistant messages on ties.
    async fn get_chat_history(&self, document_id: Uuid) -> PortResult<Vec<ChatMessage>>;
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Where the bytes for a given document identity are stored.
    fn location_for(&self, document_id: Uuid, format: DocumentFormat) -> PathBuf;

    /// Writes all of `data` to `location`. A failed write leaves nothing behind.
    async fn write(&self, location: &Path, data: &[u8]) -> PortResult<()>;

    async fn delete(&self, location: &Path) -> PortResult<()>;
}

#[async_trait]
pub trait TextExtractionService: Send + Sync {
    /// Produces the raw text of a stored file.
    async fn extract(&self, path: &Path, format: DocumentFormat) -> PortResult<String>;
}

#[async_trait]
pub trait InsightGenerationService: Send + Sync {
    /// Sends a single prompt to the text-generation service and returns its reply.
    async fn generate(&self, prompt: &str) -> PortResult<String>;
}
