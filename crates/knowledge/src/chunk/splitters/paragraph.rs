//! Paragraph-aware splitter.

use super::{window::window_spans, ChunkSplitter, Span};
use crate::chunk::ChunkConfig;

/// Packs whole paragraphs into chunks, windowing any paragraph that is
/// larger than a chunk on its own.
pub struct ParagraphSplitter;

impl ChunkSplitter for ParagraphSplitter {
    fn split(&self, text: &str, config: &ChunkConfig) -> Vec<Span> {
        if text.is_empty() {
            return Vec::new();
        }

        let max = config.max_chunk_size;
        let mut spans = Vec::new();
        let mut current: Option<(usize, usize)> = None;

        for (start, end) in paragraphs(text) {
            if end - start > max {
                if let Some((s, e)) = current.take() {
                    spans.push(Span::new(s, e));
                }
                spans.extend(window_spans(text, start, end, config));
                continue;
            }

            current = match current {
                Some((s, _)) if end - s <= max => Some((s, end)),
                Some((s, e)) => {
                    spans.push(Span::new(s, e));
                    Some((start, end))
                }
                None => Some((start, end)),
            };
        }

        if let Some((s, e)) = current {
            spans.push(Span::new(s, e));
        }

        absorb_blank_spans(text, spans, max)
    }
}

/// Byte ranges of paragraphs. Blank lines stay with the paragraph before
/// them; leading blank lines stay with the first one.
fn paragraphs(text: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut pos = 0;
    let mut seen_content = false;
    let mut previous_blank = false;

    for line in text.split_inclusive('\n') {
        let blank = line.trim().is_empty();
        if !blank && previous_blank && seen_content {
            ranges.push((start, pos));
            start = pos;
        }
        seen_content |= !blank;
        previous_blank = blank;
        pos += line.len();
    }

    ranges.push((start, text.len()));
    ranges
}

/// Fold whitespace-only spans into a neighbour when the result still fits.
fn absorb_blank_spans(text: &str, spans: Vec<Span>, max: usize) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    let mut pending: Option<Span> = None;

    for span in spans {
        let blank = text[span.start..span.end].trim().is_empty();

        if let Some(held) = pending.take() {
            if span.end - held.start <= max {
                out.push(Span {
                    start: held.start,
                    end: span.end,
                    overlap: held.overlap,
                });
                continue;
            }
            out.push(held);
        }

        if !blank {
            out.push(span);
            continue;
        }

        match out.last_mut() {
            Some(prev) if span.end - prev.start <= max && prev.end == span.start => {
                prev.end = span.end;
            }
            _ => pending = Some(span),
        }
    }

    if let Some(held) = pending {
        out.push(held);
    }
    out
}
