//! Accumulation of streamed assistant replies.

use carewatch_protocol::ResponseId;
use std::collections::HashMap;

/// Cumulative text of every in-flight streamed reply.
///
/// A buffer exists from the first chunk of a reply until its `stream_end`
/// or until the connection is torn down.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    buffers: HashMap<ResponseId, String>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` to the reply and returns the full text so far.
    pub fn append(&mut self, id: &ResponseId, chunk: &str) -> &str {
        let buffer = self.buffers.entry(id.clone()).or_default();
        buffer.push_str(chunk);
        buffer
    }

    /// Drops the buffer of a finished reply, returning what was accumulated.
    pub fn finish(&mut self, id: &ResponseId) -> Option<String> {
        self.buffers.remove(id)
    }

    /// Drops every buffer.
    pub fn clear(&mut self) {
        self.buffers.clear();
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_accumulate() {
        let mut streams = StreamAccumulator::new();
        let id = ResponseId::new("r1");

        assert_eq!(streams.append(&id, "Hel"), "Hel");
        assert_eq!(streams.append(&id, "lo"), "Hello");
        assert_eq!(streams.len(), 1);
    }

    #[test]
    fn test_interleaved_replies_are_independent() {
        let mut streams = StreamAccumulator::new();
        let a = ResponseId::new("a");
        let b = ResponseId::new("b");

        streams.append(&a, "one ");
        streams.append(&b, "uno ");
        assert_eq!(streams.append(&a, "two"), "one two");
        assert_eq!(streams.append(&b, "dos"), "uno dos");
    }

    #[test]
    fn test_finish_removes_buffer() {
        let mut streams = StreamAccumulator::new();
        let id = ResponseId::new("r1");
        streams.append(&id, "partial");

        assert_eq!(streams.finish(&id).as_deref(), Some("partial"));
        assert!(streams.is_empty());
        assert_eq!(streams.finish(&id), None);

        // A reused id starts from scratch
        assert_eq!(streams.append(&id, "new"), "new");
    }

    #[test]
    fn test_clear() {
        let mut streams = StreamAccumulator::new();
        streams.append(&ResponseId::new("a"), "x");
        streams.append(&ResponseId::new("b"), "y");
        streams.clear();
        assert!(streams.is_empty());
    }
}
