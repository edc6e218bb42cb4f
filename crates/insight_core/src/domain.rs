//! crates/insight_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Number of characters stored in each document chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Largest upload accepted by the ingestion pipeline (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// A registered user. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A file uploaded by a user whose text has been extracted and chunked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    /// Opaque handle produced by the `FileStorage` port.
    pub storage_path: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A contiguous slice of a document's extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    pub id: Uuid,
    pub document_id: Uuid,
    /// Zero-based, contiguous within a document.
    pub chunk_index: usize,
    pub content: String,
}

/// One side of a question/answer exchange about a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub message_type: MessageType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Who authored a `ChatMessage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    User,
    Assistant,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::User => "user",
            MessageType::Assistant => "assistant",
        }
    }

    /// Parses the stored tag. Returns `None` for anything other than
    /// `"user"` or `"assistant"`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "user" => Some(MessageType::User),
            "assistant" => Some(MessageType::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The file formats the ingestion pipeline knows how to extract text from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Derives the format from a declared file name, ignoring case.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name).extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(DocumentFormat::PlainText),
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            _ => None,
        }
    }

    /// The canonical lowercase extension, without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::PlainText => "txt",
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
        }
    }
}
