//! Section entity: arbitrary ordered content blocks attached to an entity.

use super::{EntityType, Tags};
use crate::id::EntityId;
use serde::{Deserialize, Serialize};

/// How a section's `content` should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentFormat {
    /// Rendered verbatim after header normalization and fence escaping.
    Markdown,
    /// Rendered verbatim, no Markdown processing.
    PlainText,
    /// Wrapped in a ```json fence.
    Json,
    /// Wrapped in a fenced code block, language inferred from title/tags.
    Code,
}

/// A titled, ordered content block owned exclusively by one entity. Cascade
/// deleted with its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Unique identifier.
    pub id: EntityId,
    /// The kind of entity this section is attached to.
    pub entity_type: EntityType,
    /// The id of the owning entity (or template, see [`EntityType::Template`]).
    pub entity_id: EntityId,
    /// Section title, shown as a `## <title>` heading on export.
    pub title: String,
    /// Short note describing when/why this section should be used. Purely
    /// descriptive metadata; never rendered into the exported Markdown.
    pub usage_description: String,
    /// The section body.
    pub content: String,
    /// How to render `content`.
    pub content_format: ContentFormat,
    /// Position among sibling sections. Non-negative; need not be contiguous
    /// except immediately after an explicit reorder.
    pub ordinal: u32,
    /// Tags.
    pub tags: Tags,
}

/// Data required to create a new section.
#[derive(Debug, Clone)]
pub struct NewSection {
    /// Owning entity kind.
    pub entity_type: EntityType,
    /// Owning entity id.
    pub entity_id: EntityId,
    /// Title.
    pub title: String,
    /// Usage note.
    pub usage_description: String,
    /// Body.
    pub content: String,
    /// Rendering format.
    pub content_format: ContentFormat,
    /// Explicit ordinal; if `None`, the store appends after the current max.
    pub ordinal: Option<u32>,
    /// Initial tags.
    pub tags: Vec<String>,
}

impl NewSection {
    /// Validate the fields that do not depend on storage lookups.
    ///
    /// # Errors
    ///
    /// Returns a validation message if `title` is empty.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Partial update for an existing section. `manage_sections`' `updateText`
/// operation sets only `content` (and optionally `content_format`);
/// `updateMetadata` sets only title/usage/tags; `update` may set any subset.
#[derive(Debug, Clone, Default)]
pub struct SectionUpdate {
    /// New title, if changing.
    pub title: Option<String>,
    /// New usage description, if changing.
    pub usage_description: Option<String>,
    /// New content, if changing.
    pub content: Option<String>,
    /// New content format, if changing.
    pub content_format: Option<ContentFormat>,
    /// Replacement tag set, if changing.
    pub tags: Option<Vec<String>>,
}

/// Filter for listing a single entity's sections.
#[derive(Debug, Clone, Default)]
pub struct SectionFilter {
    /// Restrict to sections whose tags match (AND, case-insensitive).
    pub required_tags: Vec<String>,
    /// Case-insensitive substring match over title/content.
    pub text_query: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_title() {
        let s = NewSection {
            entity_type: EntityType::Task,
            entity_id: EntityId::new(),
            title: "".to_string(),
            usage_description: String::new(),
            content: String::new(),
            content_format: ContentFormat::Markdown,
            ordinal: None,
            tags: vec![],
        };
        assert!(s.validate().is_err());
    }
}
