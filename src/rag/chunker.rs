//! Text chunking for document processing.
//!
//! Splits normalized document text into overlapping, sentence-aware segments.
//! Chunking is a pure function of `(text, chunk_size, overlap)`: the same
//! input always yields the same chunk sequence, which makes re-processing a
//! document idempotent (vector record ids derive from chunk indices).

use crate::types::{AppError, Result};

/// How far past the target end to look for a sentence boundary.
const SENTENCE_LOOKAHEAD: usize = 100;

/// A chunk of text with its position in the original source text, in char
/// offsets (whitespace trimmed from the input still counts toward offsets).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
}

/// Character-based chunker with sentence boundary detection.
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker.
    ///
    /// # Errors
    ///
    /// Returns a validation error unless `chunk_size > 0` and
    /// `overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(AppError::Validation("chunk_size must be positive".into()));
        }
        if overlap >= chunk_size {
            return Err(AppError::Validation(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Split text into overlapping chunks.
    ///
    /// Empty or whitespace-only input yields an empty vec. Input no longer
    /// than `chunk_size` comes back as a single chunk equal to the trimmed
    /// text. Longer input is cut with a moving window that prefers to end on
    /// a sentence boundary found within a bounded lookahead region.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        self.chunk_with_offsets(text)
            .into_iter()
            .map(|span| span.text)
            .collect()
    }

    /// Like [`chunk`](Self::chunk), but keeps char offsets into the original
    /// (untrimmed) source text for each chunk.
    pub fn chunk_with_offsets(&self, text: &str) -> Vec<ChunkSpan> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            tracing::debug!("empty text provided for chunking");
            return Vec::new();
        }

        // Chunking runs on the trimmed text; spans are shifted back into the
        // source frame so citation offsets index the caller's input.
        let lead_offset = text.chars().take_while(|c| c.is_whitespace()).count();

        // Window arithmetic runs on char offsets so multibyte text cannot
        // land a cut inside a code point.
        let chars: Vec<char> = trimmed.chars().collect();
        let len = chars.len();

        if len <= self.chunk_size {
            return vec![ChunkSpan {
                text: trimmed.to_string(),
                char_start: lead_offset,
                char_end: lead_offset + len,
            }];
        }

        let mut spans = Vec::new();
        let mut start = 0usize;

        while start < len {
            // Candidate end; kept unclamped so the overlap advance matches
            // the window the chunk was cut for.
            let mut end = start + self.chunk_size;

            // Not the final window: prefer the rightmost sentence boundary in
            // the lookahead region, strictly after the candidate end. A
            // marker sitting exactly at `end` does not extend the window.
            // The maximum offset among all marker hits wins even when a
            // nearer marker exists; changing this moves every downstream
            // citation offset.
            if end < len {
                let lookahead_end = (end + SENTENCE_LOOKAHEAD).min(len);
                if let Some(boundary) = rightmost_sentence_end(&chars, end + 1, lookahead_end) {
                    end = boundary + 1; // include the terminating marker
                }
            }

            let slice_end = end.min(len);
            let raw: String = chars[start..slice_end].iter().collect();
            let piece = raw.trim();
            if !piece.is_empty() {
                let lead = raw.chars().take_while(|c| c.is_whitespace()).count();
                let trail = raw.chars().rev().take_while(|c| c.is_whitespace()).count();
                spans.push(ChunkSpan {
                    text: piece.to_string(),
                    char_start: lead_offset + start + lead,
                    char_end: lead_offset + slice_end - trail,
                });
            }

            // Advance with overlap; the guard stops the loop once the next
            // window would start at or past the end of the text.
            let next = end.saturating_sub(self.overlap);
            if next == 0 || next >= len {
                break;
            }
            start = next;
        }

        tracing::debug!(
            chars = len,
            chunks = spans.len(),
            chunk_size = self.chunk_size,
            overlap = self.overlap,
            "chunked text"
        );

        spans
    }
}

/// Find the rightmost sentence-terminating marker in `chars[from..to]`.
///
/// Markers are `". "`, `"! "`, `"? "` and `"\n"`. Returns the absolute index
/// of the terminating character (the punctuation or the newline).
fn rightmost_sentence_end(chars: &[char], from: usize, to: usize) -> Option<usize> {
    let mut best = None;
    for i in from..to {
        let hit = match chars[i] {
            '\n' => true,
            '.' | '!' | '?' => chars.get(i + 1).is_some_and(|c| *c == ' '),
            _ => false,
        };
        if hit {
            best = Some(i);
        }
    }
    best
}
