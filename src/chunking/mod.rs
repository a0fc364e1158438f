//! Recursive character chunking
//!
//! Text is split at the coarsest boundary that yields pieces no longer than
//! `chunk_size`: paragraphs, then lines, then sentences, then words, then
//! single characters. Separators stay attached to the piece before them.
//! Pieces are merged greedily into chunks, and each chunk re-includes the
//! trailing pieces of the previous one, up to `chunk_overlap` characters.
//!
//! All sizes are counted in Unicode scalar values. Chunks are exact slices
//! of the source text, so dropping each chunk's overlapped prefix and
//! concatenating gives the source back.

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};
use std::collections::VecDeque;

/// Boundaries tried in order, coarsest first
pub const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " "];

/// Splits documents into overlapping chunks
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

/// A contiguous slice of the source text
#[derive(Debug, Clone, Copy)]
struct Piece {
    byte_start: usize,
    byte_end: usize,
    char_start: usize,
    chars: usize,
}

impl RecursiveChunker {
    /// Requires `chunk_overlap < chunk_size`
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split every document, keeping document order then chunk order.
    ///
    /// Each chunk inherits its document's metadata plus `start_index` and
    /// `chunk_index`.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in documents {
            for (chunk_index, (start, text)) in self.split_text(&doc.text).into_iter().enumerate() {
                let mut metadata = doc.metadata.clone();
                metadata.insert("start_index".to_string(), start.to_string());
                metadata.insert("chunk_index".to_string(), chunk_index.to_string());
                chunks.push(Chunk {
                    text: text.to_string(),
                    metadata,
                    start,
                });
            }
        }
        chunks
    }

    /// Split one text into `(char_offset, slice)` pairs
    pub fn split_text<'a>(&self, text: &'a str) -> Vec<(usize, &'a str)> {
        if text.is_empty() {
            return Vec::new();
        }

        let whole = Piece {
            byte_start: 0,
            byte_end: text.len(),
            char_start: 0,
            chars: text.chars().count(),
        };
        let mut pieces = Vec::new();
        self.split_piece(text, whole, 0, &mut pieces);

        self.merge(text, &pieces)
    }

    fn split_piece(&self, text: &str, piece: Piece, level: usize, out: &mut Vec<Piece>) {
        if piece.chars <= self.chunk_size {
            out.push(piece);
            return;
        }

        let slice = &text[piece.byte_start..piece.byte_end];
        match SEPARATORS.get(level) {
            Some(separator) => {
                let mut char_start = piece.char_start;
                for (offset, segment) in split_keeping_separator(slice, separator) {
                    let chars = segment.chars().count();
                    let sub = Piece {
                        byte_start: piece.byte_start + offset,
                        byte_end: piece.byte_start + offset + segment.len(),
                        char_start,
                        chars,
                    };
                    char_start += chars;
                    self.split_piece(text, sub, level + 1, out);
                }
            }
            None => {
                // Out of separators, fall back to single characters
                for (i, (offset, c)) in slice.char_indices().enumerate() {
                    out.push(Piece {
                        byte_start: piece.byte_start + offset,
                        byte_end: piece.byte_start + offset + c.len_utf8(),
                        char_start: piece.char_start + i,
                        chars: 1,
                    });
                }
            }
        }
    }

    fn merge<'a>(&self, text: &'a str, pieces: &[Piece]) -> Vec<(usize, &'a str)> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<Piece> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            if total + piece.chars > self.chunk_size && !window.is_empty() {
                chunks.push(slice_window(text, &window));
                // Keep a tail no longer than the overlap that still leaves room
                while total > self.chunk_overlap || (total > 0 && total + piece.chars > self.chunk_size) {
                    match window.pop_front() {
                        Some(dropped) => total -= dropped.chars,
                        None => break,
                    }
                }
            }
            total += piece.chars;
            window.push_back(piece);
        }

        if !window.is_empty() {
            chunks.push(slice_window(text, &window));
        }
        chunks
    }
}

fn slice_window<'a>(text: &'a str, window: &VecDeque<Piece>) -> (usize, &'a str) {
    match (window.front(), window.back()) {
        (Some(first), Some(last)) => (first.char_start, &text[first.byte_start..last.byte_end]),
        _ => (0, ""),
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
/// Returns byte offsets relative to `text`.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<(usize, &'a str)> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push((start, &text[start..end]));
        start = end;
    }

    if start < text.len() {
        result.push((start, &text[start..]));
    }

    result
}
