//! Tags are derived from entity `tags` fields rather than being first-class
//! stored rows; this module only holds the read-side reporting shape.

use super::EntityType;
use serde::{Deserialize, Serialize};

/// Usage summary for a single tag across all entities that carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagUsage {
    /// Canonical (first-seen casing) spelling of the tag.
    pub tag: String,
    /// Total number of entities carrying this tag.
    pub count: usize,
    /// Per-entity-kind breakdown of `count`.
    pub by_entity_type: Vec<(EntityType, usize)>,
}

/// Sort order for the tag list report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagSortOrder {
    /// Sort by usage count, descending.
    #[default]
    Count,
    /// Sort alphabetically (case-insensitive).
    Alpha,
}
