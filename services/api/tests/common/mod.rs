//! In-memory stand-ins for the ports, and a harness that wires them into an `AppState`.
//!
//! `InMemoryDb` rejects rows whose user or document does not exist, like the
//! foreign keys in the Postgres schema.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use insight_api::{adapters::{LocalFileStorage, LocalTextExtractor}, config::Config, web::state::AppState};
use insight_core::domain::{ChatMessage, Document, DocumentChunk, MessageType, User};
use insight_core::ports::{DatabaseService, InsightGenerationService, PortError, PortResult};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

//=========================================================================================
// In-memory DatabaseService
//=========================================================================================

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    documents: Vec<Document>,
    chunks: Vec<DocumentChunk>,
    messages: Vec<ChatMessage>,
}

#[derive(Default)]
pub struct InMemoryDb {
    tables: Mutex<Tables>,
    pub fail_document_writes: AtomicBool,
    pub fail_chat_writes: AtomicBool,
}

impl InMemoryDb {
    pub fn chunks_for(&self, document_id: Uuid) -> Vec<DocumentChunk> {
        let tables = self.tables.lock().unwrap();
        let mut chunks: Vec<_> = tables
            .chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        chunks
    }

    pub fn message_count(&self) -> usize {
        self.tables.lock().unwrap().messages.len()
    }

    pub fn document_count(&self) -> usize {
        self.tables.lock().unwrap().documents.len()
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user(&self, email: &str) -> PortResult<User> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| u.email == email) {
            return Err(PortError::Conflict(format!("A user with email {} already exists", email)));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let tables = self.tables.lock().unwrap();
        tables
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn create_document_with_chunks(
        &self,
        document: Document,
        chunks: Vec<DocumentChunk>,
    ) -> PortResult<Document> {
        if self.fail_document_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("connection reset".to_string()));
        }
        let mut tables = self.tables.lock().unwrap();
        if !tables.users.iter().any(|u| u.id == document.user_id) {
            return Err(PortError::Unexpected(format!(
                "documents.user_id {} references no user",
                document.user_id
            )));
        }
        tables.documents.push(document.clone());
        tables.chunks.extend(chunks);
        Ok(document)
    }

    async fn list_documents_for_user(&self, user_id: Uuid) -> PortResult<Vec<Document>> {
        let tables = self.tables.lock().unwrap();
        let mut docs: Vec<_> = tables
            .documents
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(a.id.cmp(&b.id)));
        Ok(docs)
    }

    async fn get_document(&self, document_id: Uuid) -> PortResult<Document> {
        let tables = self.tables.lock().unwrap();
        tables
            .documents
            .iter()
            .find(|d| d.id == document_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Document {} not found", document_id)))
    }

    async fn delete_document(&self, document_id: Uuid) -> PortResult<Document> {
        let mut tables = self.tables.lock().unwrap();
        let pos = tables
            .documents
            .iter()
            .position(|d| d.id == document_id)
            .ok_or_else(|| PortError::NotFound(format!("Document {} not found", document_id)))?;
        let document = tables.documents.remove(pos);
        tables.chunks.retain(|c| c.document_id != document_id);
        tables.messages.retain(|m| m.document_id != document_id);
        Ok(document)
    }

    async fn get_chunks_for_document(&self, document_id: Uuid) -> PortResult<Vec<DocumentChunk>> {
        Ok(self.chunks_for(document_id))
    }

    async fn save_chat_message(&self, message: ChatMessage) -> PortResult<()> {
        if self.fail_chat_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("chat_history is read-only".to_string()));
        }
        let mut tables = self.tables.lock().unwrap();
        if !tables.users.iter().any(|u| u.id == message.user_id) {
            return Err(PortError::Unexpected(format!(
                "chat_history.user_id {} references no user",
                message.user_id
            )));
        }
        if !tables.documents.iter().any(|d| d.id == message.document_id) {
            return Err(PortError::Unexpected(format!(
                "chat_history.document_id {} references no document",
                message.document_id
            )));
        }
        tables.messages.push(message);
        Ok(())
    }

    async fn get_chat_history(&self, document_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        let tables = self.tables.lock().unwrap();
        let mut messages: Vec<_> = tables
            .messages
            .iter()
            .filter(|m| m.document_id == document_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| (m.timestamp, m.message_type == MessageType::Assistant));
        Ok(messages)
    }
}

//=========================================================================================
// Generator stubs
//=========================================================================================

/// Replies with the query it finds at the end of the prompt, and records every prompt.
#[derive(Default)]
pub struct EchoGenerator {
    pub prompts: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl EchoGenerator {
    pub fn reply_for(query: &str) -> String {
        format!("You asked: {}", query)
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl InsightGenerationService for EchoGenerator {
    async fn generate(&self, prompt: &str) -> PortResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("Gemini returned 503 Service Unavailable".to_string()));
        }
        let query = prompt.rsplit("Query: ").next().unwrap_or_default();
        Ok(Self::reply_for(query))
    }
}

//=========================================================================================
// Harness
//=========================================================================================

pub struct TestApp {
    pub state: Arc<AppState>,
    pub db: Arc<InMemoryDb>,
    pub generator: Arc<EchoGenerator>,
    pub upload_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_pdftotext("pdftotext")
    }

    /// Uses `pdftotext` as the PDF extraction binary.
    pub fn with_pdftotext(pdftotext: impl Into<PathBuf>) -> Self {
        let upload_dir = tempfile::tempdir().unwrap();
        let upload_path = upload_dir.path().to_string_lossy().into_owned();
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://unused".to_string()),
            "GEMINI_API_KEY" => Some("test-key".to_string()),
            "UPLOAD_DIR" => Some(upload_path.clone()),
            _ => None,
        })
        .unwrap();

        let db = Arc::new(InMemoryDb::default());
        let generator = Arc::new(EchoGenerator::default());
        let state = Arc::new(AppState {
            db: db.clone(),
            config: Arc::new(config),
            storage: Arc::new(LocalFileStorage::new(upload_dir.path())),
            extractor: Arc::new(LocalTextExtractor::new(pdftotext, Duration::from_secs(5))),
            insight_adapter: generator.clone(),
        });

        Self {
            state,
            db,
            generator,
            upload_dir,
        }
    }

    pub async fn register_user(&self) -> Uuid {
        let email = format!("{}@example.com", Uuid::new_v4());
        self.db.create_user(&email).await.unwrap().id
    }

    pub fn stored_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.upload_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}
