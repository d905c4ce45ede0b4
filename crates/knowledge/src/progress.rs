//! Progress reporting for ingestion.
//!
//! The ingestor emits one event per phase step; callers decide whether to
//! print, log or ignore them.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Ingestion phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestPhase {
    Chunk,
    Store,
    Embed,
}

impl fmt::Display for IngestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IngestPhase::Chunk => "chunk",
            IngestPhase::Store => "store",
            IngestPhase::Embed => "embed",
        })
    }
}

/// Progress event emitted during ingestion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub phase: IngestPhase,
    /// Units done so far (chunks)
    pub current: u64,
    pub total: Option<u64>,
    pub message: String,
    pub elapsed_secs: Option<f64>,
}

impl ProgressEvent {
    pub fn new(
        phase: IngestPhase,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            current,
            total,
            message: message.into(),
            elapsed_secs: None,
        }
    }

    pub fn percentage(&self) -> Option<f64> {
        self.total.map(|t| {
            if t > 0 {
                (self.current as f64 / t as f64) * 100.0
            } else {
                0.0
            }
        })
    }

    /// Format as a simple user-facing line.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };
        let pct = self
            .percentage()
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();

        format!("[{}] {}{} - {}", self.phase, progress, pct, self.message)
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Emits events through an optional callback.
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

    /// Reporter that drops every event.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Instant::now(),
        }
    }

    pub fn emit(&self, mut event: ProgressEvent) {
        let Some(callback) = &self.callback else {
            return;
        };

        let elapsed = self.start_time.elapsed().as_secs_f64();
        event.elapsed_secs = Some(elapsed);
        tracing::debug!(
            phase = %event.phase,
            current = event.current,
            total = ?event.total,
            elapsed_secs = elapsed,
            "{}",
            event.message
        );
        callback(event);
    }

    pub fn chunked(&self, document: &str, chunks: usize) {
        self.emit(ProgressEvent::new(
            IngestPhase::Chunk,
            chunks as u64,
            Some(chunks as u64),
            format!("{} split into {} chunks", document, chunks),
        ));
    }

    pub fn stored(&self, chunks: usize) {
        self.emit(ProgressEvent::new(
            IngestPhase::Store,
            chunks as u64,
            Some(chunks as u64),
            "chunks stored unindexed",
        ));
    }

    pub fn embedded(&self, done: usize, total: usize, model: &str) {
        self.emit(ProgressEvent::new(
            IngestPhase::Embed,
            done as u64,
            Some(total as u64),
            format!("model={}", model),
        ));
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_event_format() {
        let event = ProgressEvent::new(IngestPhase::Embed, 5, Some(10), "model=trigram-v1");
        let formatted = event.format_simple();
        assert_eq!(formatted, "[embed] 5/10 (50%) - model=trigram-v1");
    }

    #[test]
    fn test_progress_reporter_emit() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();

        let reporter = ProgressReporter::new(Arc::new(move |event| {
            events_clone.lock().unwrap().push(event);
        }));

        reporter.chunked("Civil Code", 12);
        reporter.embedded(10, 12, "trigram-v1");

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].phase, IngestPhase::Chunk);
        assert_eq!(captured[1].current, 10);
        assert!(captured[1].elapsed_secs.is_some());
    }

    #[test]
    fn test_noop_reporter() {
        let reporter = ProgressReporter::noop();
        reporter.stored(3);
    }
}
