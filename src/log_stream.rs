//! Folding of raw process output into display-ready log entries.
//!
//! Progress-bar style tools redraw their current line with `\r`. Appending
//! every chunk verbatim would leave each stale frame on screen, so a chunk
//! containing `\r` rewrites the tail of the last entry instead: everything
//! after the last `\n` is replaced by the text following each `\r`.

use viralflow_protocol::{LogChunk, LogEntry};

/// Anything that accepts output chunks from a running (or simulated) process.
pub trait LogSink {
    fn push(&mut self, chunk: LogChunk);
}

impl LogSink for Vec<LogChunk> {
    fn push(&mut self, chunk: LogChunk) {
        Vec::push(self, chunk);
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogStreamReducer {
    entries: Vec<LogEntry>,
}

impl LogStreamReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }

    /// Folds one chunk into the sequence and returns the updated sequence.
    pub fn apply(&mut self, chunk: LogChunk) -> &[LogEntry] {
        if self.entries.is_empty() {
            self.entries.push(chunk);
            return &self.entries;
        }

        let text = chunk.text.replace("\r\n", "\n");
        if !text.contains('\r') {
            self.entries.push(chunk);
            return &self.entries;
        }

        let Some(last) = self.entries.last_mut() else {
            return &self.entries;
        };
        // The last entry keeps its kind; only its text is rewritten.
        let mut current = last.text.clone();
        let mut parts = text.split('\r');
        if let Some(first) = parts.next() {
            current.push_str(first);
        }
        for part in parts {
            let keep = current.rfind('\n').map_or(0, |nl| nl + 1);
            current.truncate(keep);
            current.push_str(part);
        }
        last.text = current;
        &self.entries
    }

    /// All entry texts concatenated, as a terminal would show them.
    pub fn render_plain(&self) -> String {
        self.entries.iter().map(|e| e.text.as_str()).collect()
    }
}

impl LogSink for LogStreamReducer {
    fn push(&mut self, chunk: LogChunk) {
        self.apply(chunk);
    }
}
