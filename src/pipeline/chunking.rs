//! Fixed-size sliding-window chunking.
//!
//! Documents are split into overlapping character windows: each chunk holds at most
//! `max_length` characters and shares exactly `overlap` characters with its predecessor, so the
//! window advances by `max_length - overlap` per step. Offsets count Unicode scalar values, not
//! bytes, so a window can never split a multibyte character.

use super::types::ChunkingError;

/// Split text into overlapping fixed-length character windows.
///
/// - `max_length` must be at least 1.
/// - `overlap` must be strictly smaller than `max_length`; otherwise the window would never
///   advance and the split is rejected rather than looping.
/// - Empty input yields an empty vector; no produced chunk is ever empty.
/// - Every chunk except possibly the last has exactly `max_length` characters, and dropping
///   each non-final chunk's trailing `overlap` characters reconstructs the input exactly.
pub fn chunk_text(
    text: &str,
    max_length: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkingError> {
    if max_length == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if overlap >= max_length {
        return Err(ChunkingError::OverlapTooLarge {
            overlap,
            max_length,
        });
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let step = max_length - overlap;
    let mut chunks = Vec::with_capacity(chars.len() / step + 1);
    let mut offset = 0;

    loop {
        let end = (offset + max_length).min(chars.len());
        chunks.push(chars[offset..end].iter().collect());
        // Once a window reaches the end of the text the remaining characters are already
        // covered; advancing again would emit a chunk contained in this one.
        if end == chars.len() {
            break;
        }
        offset += step;
    }

    Ok(chunks)
}
