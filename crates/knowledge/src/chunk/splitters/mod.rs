//! Splitter implementations wrapper module.

mod paragraph;
mod window;

pub use paragraph::ParagraphSplitter;
pub use window::WindowSplitter;

use crate::chunk::ChunkConfig;

/// A chunk boundary within a unit of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Byte offset where the chunk starts
    pub start: usize,

    /// Byte offset one past the end of the chunk
    pub end: usize,

    /// Leading bytes shared with the previous span
    pub overlap: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            overlap: 0,
        }
    }
}

/// Trait for chunk splitters.
///
/// Spans must tile the text: the first starts at 0 with no overlap, each
/// following span starts `overlap` bytes before the previous one ends, and
/// the last ends at `text.len()`.
pub trait ChunkSplitter {
    /// Split text into chunk spans.
    fn split(&self, text: &str, config: &ChunkConfig) -> Vec<Span>;
}
