//! crates/insight_core/src/prompt.rs
//!
//! Prompt assembly for document analysis.

use crate::domain::DocumentChunk;

/// Returned by the generator when the model produced no candidate output.
pub const NO_INSIGHT_SENTINEL: &str = "No insight generated by AI.";

/// Concatenates chunk contents in the order given, each followed by a newline.
///
/// Callers pass chunks already sorted by `chunk_index`. No chunks gives an
/// empty context.
pub fn assemble_context(chunks: &[DocumentChunk]) -> String {
    let mut context = String::with_capacity(chunks.iter().map(|c| c.content.len() + 1).sum());
    for chunk in chunks {
        context.push_str(&chunk.content);
        context.push('\n');
    }
    context
}

/// Builds the single instruction prompt sent to the generation service.
pub fn build_analysis_prompt(context: &str, query: &str) -> String {
    format!(
        "Based ONLY on the following document content, answer the query. \
         If the information is not available in the document, state that. \
         \n\nDocument Content:\n{context}\n\nQuery: {query}"
    )
}
