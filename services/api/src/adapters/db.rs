//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use insight_core::domain::{ChatMessage, Document, DocumentChunk, MessageType, User};
use insight_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            email: self.email,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct DocumentRecord {
    id: Uuid,
    user_id: Uuid,
    file_name: String,
    storage_path: String,
    uploaded_at: DateTime<Utc>,
}
impl DocumentRecord {
    fn to_domain(self) -> Document {
        Document {
            id: self.id,
            user_id: self.user_id,
            file_name: self.file_name,
            storage_path: self.storage_path,
            uploaded_at: self.uploaded_at,
        }
    }
}

#[derive(FromRow)]
struct ChunkRecord {
    id: Uuid,
    document_id: Uuid,
    chunk_index: i32,
    content: String,
}
impl ChunkRecord {
    fn to_domain(self) -> DocumentChunk {
        DocumentChunk {
            id: self.id,
            document_id: self.document_id,
            chunk_index: self.chunk_index as usize,
            content: self.content,
        }
    }
}

#[derive(FromRow)]
struct ChatMessageRecord {
    id: Uuid,
    document_id: Uuid,
    user_id: Uuid,
    message_type: String,
    message_content: String,
    timestamp: DateTime<Utc>,
}
impl ChatMessageRecord {
    fn to_domain(self) -> PortResult<ChatMessage> {
        let message_type = MessageType::from_tag(&self.message_type).ok_or_else(|| {
            PortError::Unexpected(format!(
                "Chat message {} has unknown type '{}'",
                self.id, self.message_type
            ))
        })?;
        Ok(ChatMessage {
            id: self.id,
            document_id: self.document_id,
            user_id: self.user_id,
            message_type,
            content: self.message_content,
            timestamp: self.timestamp,
        })
    }
}

const DOCUMENT_COLUMNS: &str = "id, user_id, file_name, storage_path, uploaded_at";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, email: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, email, created_at) VALUES ($1, $2, $3) RETURNING id, email, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict(format!("A user with email {} already exists", email))
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn create_document_with_chunks(
        &self,
        document: Document,
        chunks: Vec<DocumentChunk>,
    ) -> PortResult<Document> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, DocumentRecord>(&format!(
            "INSERT INTO documents ({cols}) VALUES ($1, $2, $3, $4, $5) RETURNING {cols}",
            cols = DOCUMENT_COLUMNS
        ))
        .bind(document.id)
        .bind(document.user_id)
        .bind(&document.file_name)
        .bind(&document.storage_path)
        .bind(document.uploaded_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        for chunk in &chunks {
            sqlx::query(
                "INSERT INTO document_chunks (id, document_id, chunk_index, content) VALUES ($1, $2, $3, $4)",
            )
            .bind(chunk.id)
            .bind(chunk.document_id)
            .bind(chunk.chunk_index as i32)
            .bind(&chunk.content)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                PortError::Unexpected(format!(
                    "Failed to save chunk {} of document {}: {}",
                    chunk.chunk_index, document.id, e
                ))
            })?;
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_documents_for_user(&self, user_id: Uuid) -> PortResult<Vec<Document>> {
        let records = sqlx::query_as::<_, DocumentRecord>(&format!(
            "SELECT {} FROM documents WHERE user_id = $1 ORDER BY uploaded_at DESC, id ASC",
            DOCUMENT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_document(&self, document_id: Uuid) -> PortResult<Document> {
        let record = sqlx::query_as::<_, DocumentRecord>(&format!(
            "SELECT {} FROM documents WHERE id = $1",
            DOCUMENT_COLUMNS
        ))
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Document {} not found", document_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_document(&self, document_id: Uuid) -> PortResult<Document> {
        // Chunks and chat history go with it via ON DELETE CASCADE.
        let record = sqlx::query_as::<_, DocumentRecord>(&format!(
            "DELETE FROM documents WHERE id = $1 RETURNING {}",
            DOCUMENT_COLUMNS
        ))
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Document {} not found", document_id)))?;
        Ok(record.to_domain())
    }

    async fn get_chunks_for_document(&self, document_id: Uuid) -> PortResult<Vec<DocumentChunk>> {
        let records = sqlx::query_as::<_, ChunkRecord>(
            "SELECT id, document_id, chunk_index, content FROM document_chunks WHERE document_id = $1 ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn save_chat_message(&self, message: ChatMessage) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO chat_history (id, document_id, user_id, message_type, message_content, timestamp) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(message.id)
        .bind(message.document_id)
        .bind(message.user_id)
        .bind(message.message_type.as_str())
        .bind(&message.content)
        .bind(message.timestamp)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_chat_history(&self, document_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        // A user message and its reply share a timestamp; `false` sorts first.
        let records = sqlx::query_as::<_, ChatMessageRecord>(
            "SELECT id, document_id, user_id, message_type, message_content, timestamp FROM chat_history \
             WHERE document_id = $1 ORDER BY timestamp ASC, (message_type = 'assistant') ASC, id ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }
}
