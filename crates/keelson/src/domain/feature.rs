//! Feature entity.

use super::{Priority, Status, Tags};
use crate::id::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A feature, optionally owned by a [`super::Project`]. Owns zero or more
/// [`super::Task`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    /// Unique identifier.
    pub id: EntityId,
    /// Feature name.
    pub name: String,
    /// Summary.
    pub summary: String,
    /// Optional longer-form description.
    pub description: Option<String>,
    /// Current status, drawn from the active feature flow.
    pub status: Status,
    /// Priority.
    pub priority: Priority,
    /// Owning project, or `None` if unassigned.
    pub project_id: Option<EntityId>,
    /// Tags.
    pub tags: Tags,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub modified_at: DateTime<Utc>,
}

/// Data required to create a new feature.
#[derive(Debug, Clone, Default)]
pub struct NewFeature {
    /// Feature name.
    pub name: String,
    /// Summary text.
    pub summary: String,
    /// Optional description.
    pub description: Option<String>,
    /// Priority (defaults to medium if unset at the call site).
    pub priority: Priority,
    /// Owning project, or `None` for an unassigned feature.
    pub project_id: Option<EntityId>,
    /// Initial tags.
    pub tags: Vec<String>,
    /// Template ids to materialize onto the new feature, in order.
    pub template_ids: Vec<EntityId>,
}

impl NewFeature {
    /// Validate the fields that do not depend on storage lookups.
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

/// Partial update for an existing feature.
///
/// `project_id` uses the double-`Option` pattern: `None` leaves it
/// unchanged, `Some(None)` unassigns the feature, `Some(Some(id))` moves it
/// to a different project. Changing `project_id` is an observable "move" the
/// export pipeline must react to.
#[derive(Debug, Clone, Default)]
pub struct FeatureUpdate {
    /// New name, if changing.
    pub name: Option<String>,
    /// New summary, if changing.
    pub summary: Option<String>,
    /// New description, if changing (double-Option).
    pub description: Option<Option<String>>,
    /// New status, if changing (validated by the workflow engine).
    pub status: Option<Status>,
    /// New priority, if changing.
    pub priority: Option<Priority>,
    /// New project assignment, if changing (double-Option, see struct docs).
    pub project_id: Option<Option<EntityId>>,
    /// Replacement tag set, if changing.
    pub tags: Option<Vec<String>>,
}

/// Filter for `findAll`-style feature queries.
#[derive(Debug, Clone, Default)]
pub struct FeatureFilter {
    /// Status include/exclude filter.
    pub status: crate::store::StatusFilter,
    /// Priority include/exclude filter.
    pub priority: crate::store::PriorityFilter,
    /// Tags every matching feature must carry (AND, case-insensitive).
    pub required_tags: Vec<String>,
    /// Case-insensitive substring match over name/summary/description.
    pub text_query: Option<String>,
    /// Restrict to features owned by this project.
    pub project_id: Option<EntityId>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}
