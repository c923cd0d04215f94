//! Template entity: a named, ordered set of section prototypes that can be
//! materialized onto a project, feature, or task.

use super::{ContentFormat, EntityType};
use crate::id::EntityId;
use serde::{Deserialize, Serialize};

/// A prototype section owned by a template. Materialized into a real
/// [`super::Section`] on apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionPrototype {
    /// Title to give the materialized section.
    pub title: String,
    /// Usage note carried onto the materialized section.
    pub usage_description: String,
    /// Content carried onto the materialized section.
    pub content: String,
    /// Rendering format carried onto the materialized section.
    pub content_format: ContentFormat,
    /// Tags carried onto the materialized section.
    pub tags: Vec<String>,
}

/// A named set of section prototypes for a given target entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Unique identifier.
    pub id: EntityId,
    /// Template name.
    pub name: String,
    /// Human-readable description of what this template is for.
    pub description: String,
    /// The entity kind this template may be applied to.
    pub target_entity_type: EntityType,
    /// Whether the template is selectable for application.
    pub is_enabled: bool,
    /// Whether this is a built-in template, restored on startup and
    /// immutable thereafter (its sections cannot be edited, only its
    /// `is_enabled` flag).
    pub is_builtin: bool,
    /// Section prototypes, in application order.
    pub sections: Vec<SectionPrototype>,
}

/// Data required to create a new (user-defined) template.
#[derive(Debug, Clone, Default)]
pub struct NewTemplate {
    /// Name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Target entity type.
    pub target_entity_type: Option<EntityType>,
    /// Section prototypes, in order.
    pub sections: Vec<NewSectionPrototype>,
}

/// Data for one prototype section within a [`NewTemplate`].
#[derive(Debug, Clone)]
pub struct NewSectionPrototype {
    /// Title.
    pub title: String,
    /// Usage note.
    pub usage_description: String,
    /// Content.
    pub content: String,
    /// Rendering format.
    pub content_format: ContentFormat,
    /// Tags.
    pub tags: Vec<String>,
}

impl NewTemplate {
    /// Validate the fields that do not depend on storage lookups.
    ///
    /// # Errors
    ///
    /// Returns a validation message if `name` is empty or `target_entity_type`
    /// is unset.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name cannot be empty".to_string());
        }
        if self.target_entity_type.is_none() {
            return Err("targetEntityType is required".to_string());
        }
        Ok(())
    }
}
