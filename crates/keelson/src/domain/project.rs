//! Project entity.

use super::{Status, Tags};
use crate::id::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A top-level project. Owns zero or more [`super::Feature`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier.
    pub id: EntityId,
    /// Project name.
    pub name: String,
    /// Summary, required to be 300-500 characters once the project reaches
    /// a terminal "completed" status (enforced by the workflow engine, not
    /// here, since the bound only applies at that point in the lifecycle).
    pub summary: String,
    /// Optional longer-form description.
    pub description: Option<String>,
    /// Current status, drawn from the active project flow.
    pub status: Status,
    /// Tags.
    pub tags: Tags,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub modified_at: DateTime<Utc>,
}

/// Data required to create a new project.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    /// Project name.
    pub name: String,
    /// Summary text.
    pub summary: String,
    /// Optional description.
    pub description: Option<String>,
    /// Initial tags.
    pub tags: Vec<String>,
    /// Template ids to materialize onto the new project, in order.
    pub template_ids: Vec<EntityId>,
}

impl NewProject {
    /// Validate the fields that do not depend on workflow/status context.
    ///
    /// # Errors
    ///
    /// Returns a validation message if `name` is empty.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Partial update for an existing project.
///
/// `description` uses the double-`Option` pattern: `None` leaves it
/// unchanged, `Some(None)` clears it, `Some(Some(text))` sets it.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    /// New name, if changing.
    pub name: Option<String>,
    /// New summary, if changing.
    pub summary: Option<String>,
    /// New description, if changing (double-Option, see struct docs).
    pub description: Option<Option<String>>,
    /// New status, if changing (validated by the workflow engine).
    pub status: Option<Status>,
    /// Replacement tag set, if changing.
    pub tags: Option<Vec<String>>,
}

/// Filter for `findAll`-style project queries.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    /// Status include/exclude filter.
    pub status: crate::store::StatusFilter,
    /// Tags every matching project must carry (AND, case-insensitive).
    pub required_tags: Vec<String>,
    /// Case-insensitive substring match over name/summary/description.
    pub text_query: Option<String>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_name() {
        let p = NewProject {
            name: "   ".to_string(),
            ..Default::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn validate_accepts_nonempty_name() {
        let p = NewProject {
            name: "Atlas".to_string(),
            ..Default::default()
        };
        assert!(p.validate().is_ok());
    }
}
