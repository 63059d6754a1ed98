//! Splitting oversized input into bounded pieces.
//!
//! Sizes are measured in characters, never bytes, so a chunk boundary can never land
//! inside a multi-byte character.

use crate::error::{Error, Result};

/// Default upper bound on the size of one chunk, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 3072;

/// Splits `text` into consecutive slices of at most `max_size` characters.
///
/// Every chunk but the last holds exactly `max_size` characters and no chunk is empty.
/// Concatenating the chunks in order reproduces `text`.  Empty input yields no chunks.
///
/// # Errors
///
/// Returns a chunking error if `max_size` is zero.
pub fn split(text: &str, max_size: usize) -> Result<Vec<&str>> {
    if max_size == 0 {
        return Err(Error::chunking("chunk size must be at least 1", max_size));
    }
    let mut chunks = Vec::with_capacity(text.len() / max_size + 1);
    let mut start = 0;
    let mut count = 0;
    for (offset, _) in text.char_indices() {
        if count == max_size {
            chunks.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    Ok(chunks)
}

/// Returns true if `text` is longer than `max_size` characters.
pub fn exceeds(text: &str, max_size: usize) -> bool {
    text.chars().nth(max_size).is_some()
}
