//! Sliding-window splitter with Unicode-aware boundaries.

use super::{ChunkSplitter, Span};
use crate::chunk::ChunkConfig;
use unicode_segmentation::UnicodeSegmentation;

/// Fixed-size windows with overlap, ending on grapheme boundaries and
/// preferring whitespace.
pub struct WindowSplitter;

impl ChunkSplitter for WindowSplitter {
    fn split(&self, text: &str, config: &ChunkConfig) -> Vec<Span> {
        if text.is_empty() {
            return Vec::new();
        }
        window_spans(text, 0, text.len(), config)
    }
}

/// Windows covering `text[start..end]`; the first window has no overlap.
pub(crate) fn window_spans(text: &str, start: usize, end: usize, config: &ChunkConfig) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut window_start = start;
    let mut overlap = 0;

    loop {
        let window_end = find_window_end(
            text,
            window_start,
            window_start + overlap,
            end,
            config.max_chunk_size,
        );
        spans.push(Span {
            start: window_start,
            end: window_end,
            overlap,
        });

        if window_end >= end {
            break;
        }

        let next_start = find_overlap_start(text, window_start, window_end, config.chunk_overlap);
        overlap = window_end - next_start;
        window_start = next_start;
    }

    tracing::trace!(
        "Window splitter produced {} spans over {} bytes",
        spans.len(),
        end - start
    );

    spans
}

/// Pick the end of a window starting at `start` that must extend past `covered`.
fn find_window_end(text: &str, start: usize, covered: usize, limit: usize, max: usize) -> usize {
    if limit - start <= max {
        return limit;
    }

    let window = &text[start..limit];
    let covered = covered - start;

    let mut best = None;
    let mut best_whitespace = None;
    let mut after_whitespace = false;

    for (offset, grapheme) in window.grapheme_indices(true) {
        if offset > max {
            break;
        }
        if offset > covered {
            best = Some(offset);
            if after_whitespace {
                best_whitespace = Some(offset);
            }
        }
        after_whitespace = grapheme.chars().all(char::is_whitespace);
    }

    let chosen = match (best_whitespace, best) {
        // Only break on whitespace when it keeps at least half the window
        (Some(ws), _) if ws - covered >= (max.saturating_sub(covered)) / 2 => ws,
        (_, Some(boundary)) => boundary,
        // A single grapheme wider than the window: take it whole
        _ => window
            .grapheme_indices(true)
            .map(|(offset, _)| offset)
            .chain(std::iter::once(window.len()))
            .find(|&offset| offset > covered)
            .unwrap_or(window.len()),
    };

    start + chosen
}

/// Where the next window starts so it repeats about `overlap` bytes.
fn find_overlap_start(text: &str, start: usize, end: usize, overlap: usize) -> usize {
    if overlap == 0 {
        return end;
    }

    let target = end.saturating_sub(overlap).max(start + 1);
    let boundaries: Vec<usize> = text[start..end]
        .grapheme_indices(true)
        .map(|(offset, _)| start + offset)
        .filter(|&pos| pos >= target)
        .collect();

    // Prefer starting the overlap at a word
    boundaries
        .iter()
        .copied()
        .find(|&pos| {
            text[..pos]
                .chars()
                .next_back()
                .is_some_and(char::is_whitespace)
        })
        .or_else(|| boundaries.first().copied())
        .unwrap_or(end)
}
