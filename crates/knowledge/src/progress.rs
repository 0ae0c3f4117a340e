//! Progress reporting for batch ingestion.
//!
//! Each file of a batch passes through the load, chunk, embed and index
//! phases; a reporter turns those steps into events for the caller (the CLI
//! prints them) and mirrors them to `tracing` at debug level.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Step of the ingestion pipeline an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Load,
    Chunk,
    Embed,
    Index,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Load => "load",
            Phase::Chunk => "chunk",
            Phase::Embed => "embed",
            Phase::Index => "index",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress event emitted during ingestion.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: Phase,

    /// 1-based position of the file in the batch
    pub current: u64,

    /// Files in the batch
    pub total: u64,

    pub filename: String,

    /// Human-readable detail
    pub message: String,

    /// Seconds since the reporter was created
    pub elapsed_secs: f64,
}

impl ProgressEvent {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.current as f64 / self.total as f64) * 100.0
        }
    }

    /// Format as a single user-facing line.
    pub fn format_simple(&self) -> String {
        format!(
            "[{}] {}/{} ({:.0}%) {} - {}",
            self.phase,
            self.current,
            self.total,
            self.percentage(),
            self.filename,
            self.message
        )
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Emits progress events through an optional callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Instant,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Instant::now(),
        }
    }

    /// A reporter that only logs.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Instant::now(),
        }
    }

    fn emit(&self, phase: Phase, current: u64, total: u64, filename: &str, message: String) {
        let event = ProgressEvent {
            phase,
            current,
            total,
            filename: filename.to_string(),
            message,
            elapsed_secs: self.start_time.elapsed().as_secs_f64(),
        };

        tracing::debug!(
            phase = %event.phase,
            current = event.current,
            total = event.total,
            file = %event.filename,
            elapsed_secs = event.elapsed_secs,
            "{}",
            event.message
        );

        if let Some(callback) = &self.callback {
            callback(event);
        }
    }

    pub fn load(&self, current: u64, total: u64, filename: &str) {
        self.emit(Phase::Load, current, total, filename, "reading".to_string());
    }

    pub fn chunk(&self, current: u64, total: u64, filename: &str, chunks: usize) {
        self.emit(
            Phase::Chunk,
            current,
            total,
            filename,
            format!("{} chunks", chunks),
        );
    }

    pub fn embed(&self, current: u64, total: u64, filename: &str, model: &str) {
        self.emit(
            Phase::Embed,
            current,
            total,
            filename,
            format!("model={}", model),
        );
    }

    pub fn index(&self, current: u64, total: u64, filename: &str) {
        self.emit(Phase::Index, current, total, filename, "stored".to_string());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_format_simple() {
        let event = ProgressEvent {
            phase: Phase::Embed,
            current: 1,
            total: 4,
            filename: "telework.pdf".to_string(),
            message: "model=nomic-embed-text".to_string(),
            elapsed_secs: 0.5,
        };

        assert_eq!(
            event.format_simple(),
            "[embed] 1/4 (25%) telework.pdf - model=nomic-embed-text"
        );
    }

    #[test]
    fn test_reporter_emits_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();

        let reporter = ProgressReporter::new(Arc::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        reporter.load(1, 2, "a.txt");
        reporter.chunk(1, 2, "a.txt", 3);

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].phase, Phase::Load);
        assert_eq!(captured[1].message, "3 chunks");
    }

    #[test]
    fn test_noop_reporter() {
        let reporter = ProgressReporter::noop();
        reporter.index(1, 1, "a.txt");
    }

    #[test]
    fn test_empty_batch_percentage() {
        let event = ProgressEvent {
            phase: Phase::Load,
            current: 0,
            total: 0,
            filename: String::new(),
            message: String::new(),
            elapsed_secs: 0.0,
        };
        assert_eq!(event.percentage(), 0.0);
    }
}
