//! Character-based chunker with overlap and whitespace boundary snapping.
//!
//! Deterministic: identical inputs and parameters always produce the same
//! chunk sequence. Only ASCII space/tab/newline count as boundaries.

use pharmakon_common::{PharmakonError, Result};

use crate::models::Chunk;

/// Split `text` into overlapping chunks of at most `chunk_size` characters.
///
/// The input is trimmed first; offsets are character positions into the
/// trimmed text. When a chunk would cut mid-word and the window contains
/// whitespace beyond 60% of `chunk_size`, the cut snaps back to that
/// whitespace. Each emitted chunk is itself trimmed; empty chunks are dropped
/// but keep no hole in the offset sequence.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(PharmakonError::InvalidArgument(
            "chunk_size must be > 0".to_string(),
        ));
    }
    if chunk_overlap >= chunk_size {
        return Err(PharmakonError::InvalidArgument(format!(
            "chunk_overlap ({chunk_overlap}) must be < chunk_size ({chunk_size})"
        )));
    }

    let chars: Vec<char> = text.trim().chars().collect();
    let n = chars.len();
    if n == 0 {
        return Ok(vec![]);
    }

    // Whitespace beyond this point in the window is a good-enough cut.
    let snap_floor = (chunk_size as f32 * 0.6) as usize;

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut start = 0usize;

    while start < n {
        let raw_end = (start + chunk_size).min(n);

        // Prefer to cut at whitespace to avoid chopping words.
        let mut end = raw_end;
        if raw_end < n {
            let last_space = chars[start..raw_end]
                .iter()
                .rposition(|c| matches!(c, ' ' | '\n' | '\t'));
            if let Some(pos) = last_space {
                if pos > snap_floor {
                    end = start + pos;
                }
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(Chunk {
                text: trimmed.to_string(),
                start,
                end,
            });
        }

        if end >= n {
            break;
        }

        let this_start = start;
        start = end.saturating_sub(chunk_overlap);

        // Guard: force forward progress. Compared against this iteration's
        // start, not the last emitted chunk, so an all-whitespace window
        // (chunk dropped) cannot stall the loop when the overlap is large.
        if start <= this_start {
            start = end;
        }
    }

    Ok(chunks)
}
