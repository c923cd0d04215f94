//! Query and filter operations for JSONL data.
//!
//! This module provides functionality for querying and filtering JSONL records.

/// Query builder for filtering JSONL data.
///
/// This is a placeholder implementation that will be expanded with actual
/// query functionality.
pub struct Query;

impl Query {
    /// Creates a new query builder.
    pub fn new() -> Self {
        Query
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}
