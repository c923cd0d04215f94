//! Task entity.

use super::{Priority, Status, Tags};
use crate::id::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum summary length required for a task to reach a completion status.
pub const MIN_COMPLETION_SUMMARY_LEN: usize = 300;
/// Maximum summary length required for a task to reach a completion status.
pub const MAX_COMPLETION_SUMMARY_LEN: usize = 500;

/// A task, optionally owned by a [`super::Feature`] and/or [`super::Project`].
/// May be fully orphaned (neither set).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    pub id: EntityId,
    /// Task title.
    pub title: String,
    /// Summary (length-gated at completion, see [`MIN_COMPLETION_SUMMARY_LEN`]).
    pub summary: String,
    /// Optional longer-form description.
    pub description: Option<String>,
    /// Current status, drawn from the active task flow.
    pub status: Status,
    /// Priority.
    pub priority: Priority,
    /// Complexity estimate, 1 (trivial) to 10 (very complex).
    pub complexity: u8,
    /// Tags.
    pub tags: Tags,
    /// Owning feature, if any.
    pub feature_id: Option<EntityId>,
    /// Owning project. Inherited from the feature when `feature_id` is set
    /// and `project_id` is not supplied explicitly at creation.
    pub project_id: Option<EntityId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub modified_at: DateTime<Utc>,
}

impl Task {
    /// True once `status` is in the configured terminal set is determined by
    /// the workflow engine; this helper only checks the summary-length gate
    /// used as a completion prerequisite (spec: "Task -> completion requires
    /// summary length [300,500]").
    #[must_use]
    pub fn summary_satisfies_completion_gate(&self) -> bool {
        let len = self.summary.chars().count();
        (MIN_COMPLETION_SUMMARY_LEN..=MAX_COMPLETION_SUMMARY_LEN).contains(&len)
    }
}

/// Complexity bounds.
pub const MIN_COMPLEXITY: u8 = 1;
/// Complexity bounds.
pub const MAX_COMPLEXITY: u8 = 10;

/// Data required to create a new task.
#[derive(Debug, Clone)]
pub struct NewTask {
    /// Title.
    pub title: String,
    /// Summary text.
    pub summary: String,
    /// Optional description.
    pub description: Option<String>,
    /// Priority.
    pub priority: Priority,
    /// Complexity, 1-10.
    pub complexity: u8,
    /// Owning feature, if any.
    pub feature_id: Option<EntityId>,
    /// Explicit owning project. If `None` and `feature_id` is set, the
    /// project is inherited from the feature at creation time.
    pub project_id: Option<EntityId>,
    /// Initial tags.
    pub tags: Vec<String>,
    /// Template ids to materialize onto the new task, in order.
    pub template_ids: Vec<EntityId>,
}

impl Default for NewTask {
    fn default() -> Self {
        Self {
            title: String::new(),
            summary: String::new(),
            description: None,
            priority: Priority::default(),
            complexity: 5,
            feature_id: None,
            project_id: None,
            tags: Vec::new(),
            template_ids: Vec::new(),
        }
    }
}

impl NewTask {
    /// Validate the fields that do not depend on storage lookups.
    ///
    /// # Errors
    ///
    /// Returns a validation message if `title` is empty or `complexity` is
    /// out of the 1-10 range.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title cannot be empty".to_string());
        }
        if !(MIN_COMPLEXITY..=MAX_COMPLEXITY).contains(&self.complexity) {
            return Err(format!(
                "complexity must be in range {MIN_COMPLEXITY}-{MAX_COMPLEXITY} (got {})",
                self.complexity
            ));
        }
        Ok(())
    }
}

/// Partial update for an existing task.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    /// New title, if changing.
    pub title: Option<String>,
    /// New summary, if changing.
    pub summary: Option<String>,
    /// New description, if changing (double-Option).
    pub description: Option<Option<String>>,
    /// New status, if changing (validated by the workflow engine).
    pub status: Option<Status>,
    /// New priority, if changing.
    pub priority: Option<Priority>,
    /// New complexity, if changing.
    pub complexity: Option<u8>,
    /// New feature assignment, if changing (double-Option).
    pub feature_id: Option<Option<EntityId>>,
    /// New project assignment, if changing (double-Option).
    pub project_id: Option<Option<EntityId>>,
    /// Replacement tag set, if changing.
    pub tags: Option<Vec<String>>,
}

/// Filter for `findAll`-style task queries.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Status include/exclude filter.
    pub status: crate::store::StatusFilter,
    /// Priority include/exclude filter.
    pub priority: crate::store::PriorityFilter,
    /// Tags every matching task must carry (AND, case-insensitive).
    pub required_tags: Vec<String>,
    /// Case-insensitive substring match over title/summary/description.
    pub text_query: Option<String>,
    /// Restrict to tasks owned (directly or via inheritance) by this project.
    pub project_id: Option<EntityId>,
    /// Restrict to tasks owned by this feature.
    pub feature_id: Option<EntityId>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}
