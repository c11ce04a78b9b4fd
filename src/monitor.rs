// src/monitor.rs
//
// Display log for decoded serial text.
// Append-ordered during a session; cleared on request or on disconnect.

use std::sync::{Arc, Mutex};

/// Shared, ordered log of decoded text chunks.
///
/// Cloning returns another handle to the same log: the session's read loop
/// appends while the UI collaborator reads. Growth is unbounded; callers
/// with long-running sessions are expected to `clear()` periodically.
#[derive(Clone, Default)]
pub struct Monitor {
    chunks: Arc<Mutex<Vec<String>>>,
}

impl Monitor {
    pub fn new() -> Self {
        Monitor::default()
    }

    /// Append a decoded chunk. Arrival order is preserved.
    pub fn append(&self, text: &str) {
        if let Ok(mut chunks) = self.chunks.lock() {
            chunks.push(text.to_string());
        }
    }

    /// Drop all logged text.
    pub fn clear(&self) {
        if let Ok(mut chunks) = self.chunks.lock() {
            chunks.clear();
        }
    }

    /// All logged text, concatenated in arrival order.
    pub fn contents(&self) -> String {
        self.chunks
            .lock()
            .map(|chunks| chunks.concat())
            .unwrap_or_default()
    }

    /// The logged chunks in arrival order.
    pub fn chunks(&self) -> Vec<String> {
        self.chunks
            .lock()
            .map(|chunks| chunks.clone())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.lock().map(|chunks| chunks.is_empty()).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let monitor = Monitor::new();
        monitor.append("one ");
        monitor.append("two ");
        monitor.append("three");
        assert_eq!(monitor.contents(), "one two three");
        assert_eq!(monitor.chunks().len(), 3);
    }

    #[test]
    fn test_clear_empties_log() {
        let monitor = Monitor::new();
        monitor.append("data");
        assert!(!monitor.is_empty());
        monitor.clear();
        assert!(monitor.is_empty());
        assert_eq!(monitor.contents(), "");
    }

    #[test]
    fn test_handles_share_one_log() {
        let monitor = Monitor::new();
        let writer = monitor.clone();
        writer.append("shared");
        assert_eq!(monitor.contents(), "shared");
    }
}
