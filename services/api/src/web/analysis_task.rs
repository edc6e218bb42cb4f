//! services/api/src/web/analysis_task.rs
//!
//! This module contains the worker function responsible for a single
//! question-and-answer cycle against a stored document.

use crate::{
    error::ApiError,
    web::{ingest_task::require_owner, state::AppState},
};
use chrono::Utc;
use insight_core::{
    domain::{ChatMessage, MessageType},
    prompt::{assemble_context, build_analysis_prompt},
};
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// Answers `query` from the document's content and records the exchange.
///
/// The asking user must be registered, since chat history references it.
/// The reply is returned even if recording the chat history fails.
pub async fn analyze_document(
    app_state: &AppState,
    document_id: Uuid,
    user: Option<&str>,
    query: &str,
) -> Result<String, ApiError> {
    let start_time = Instant::now();
    let user_id = require_owner(user)?;

    app_state.db.get_user(user_id).await?;
    app_state.db.get_document(document_id).await?;

    let chunks = app_state.db.get_chunks_for_document(document_id).await?;
    let context = assemble_context(&chunks);
    let prompt = build_analysis_prompt(&context, query);
    info!(
        "Analyzing document {} ({} chunks) for user {}.",
        document_id,
        chunks.len(),
        user_id
    );

    let llm_start = Instant::now();
    let reply = app_state
        .insight_adapter
        .generate(&prompt)
        .await
        .map_err(|e| ApiError::GenerationFailed(e.to_string()))?;
    info!("Generation took {:?}.", llm_start.elapsed());

    // Both sides of the exchange share one timestamp.
    let timestamp = Utc::now();
    let exchange = [
        (MessageType::User, query.to_string()),
        (MessageType::Assistant, reply.clone()),
    ];
    for (message_type, content) in exchange {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            document_id,
            user_id,
            message_type,
            content,
            timestamp,
        };
        if let Err(e) = app_state.db.save_chat_message(message).await {
            error!(
                "Failed to save {} chat message for document {}: {}",
                message_type, document_id, e
            );
        }
    }

    info!("Total analysis took {:?}.", start_time.elapsed());
    Ok(reply)
}
