//! crates/insight_core/src/chunker.rs
//!
//! Splits extracted document text into fixed-size, ordered pieces.

/// Splits `text` into consecutive pieces of `max_chunk_size` characters.
///
/// Lengths are measured in Unicode scalar values, so a multi-byte character
/// is never split. Every piece except possibly the last holds exactly
/// `max_chunk_size` characters, and concatenating the pieces in order gives
/// back `text`. Empty input yields no pieces.
///
/// # Panics
///
/// Panics if `max_chunk_size` is zero.
pub fn chunk_text(text: &str, max_chunk_size: usize) -> Vec<String> {
    assert!(max_chunk_size > 0, "chunk size must be positive");

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in text.char_indices() {
        if count == max_chunk_size {
            chunks.push(text[start..offset].to_string());
            start = offset;
            count = 0;
        }
        count += 1;
    }

    if start < text.len() {
        chunks.push(text[start..].to_string());
    }

    chunks
}
