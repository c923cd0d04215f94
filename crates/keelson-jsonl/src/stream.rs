//! Streaming operations for JSONL data.
//!
//! This module provides functionality for streaming large JSONL files
//! with minimal memory usage.

/// Stream processor for JSONL data.
///
/// This is a placeholder implementation that will be expanded with actual
/// streaming functionality.
pub struct Stream;

impl Stream {
    /// Creates a new stream processor.
    pub fn new() -> Self {
        Stream
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::new()
    }
}
