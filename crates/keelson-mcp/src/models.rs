//! MCP tool parameter and response types.
//!
//! Every tool returns the same envelope shape (`success`/`message`/`data`/
//! `error`), so callers can dispatch on `success` without knowing each
//! tool's payload shape ahead of time.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uniform response envelope returned by every tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable summary of what happened.
    pub message: String,
    /// Operation-specific payload, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Structured error detail, present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

/// Structured error detail attached to a failed [`ToolResponse`].
#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    /// Stable error code (e.g. `VALIDATION_ERROR`, `RESOURCE_NOT_FOUND`).
    pub code: String,
    /// Human-readable detail.
    pub message: String,
}

impl ToolResponse {
    /// Build a success envelope from a serializable payload.
    pub fn ok(message: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: serde_json::to_value(data).ok(),
            error: None,
        }
    }

    /// Build a success envelope with no payload.
    pub fn ok_empty(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), data: None, error: None }
    }

    /// Build a failure envelope from a dispatch-layer [`crate::error::Error`].
    pub fn err(error: &crate::error::Error) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            data: None,
            error: Some(ToolError { code: error.code().to_string(), message: error.to_string() }),
        }
    }
}

/// The three container kinds `manage_container`/`query_container` operate
/// over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    /// A top-level project.
    Project,
    /// A feature, optionally owned by a project.
    Feature,
    /// A task, optionally owned by a feature and/or project.
    Task,
}

impl From<ContainerKind> for keelson::domain::EntityType {
    fn from(kind: ContainerKind) -> Self {
        match kind {
            ContainerKind::Project => keelson::domain::EntityType::Project,
            ContainerKind::Feature => keelson::domain::EntityType::Feature,
            ContainerKind::Task => keelson::domain::EntityType::Task,
        }
    }
}

/// `manage_container` operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContainerOperation {
    /// Create a new container.
    Create,
    /// Update an existing container.
    Update,
    /// Delete a container and cascade to its children.
    Delete,
}

/// Parameters for `manage_container`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ManageContainerParams {
    /// Which operation to perform.
    pub operation: ContainerOperation,
    /// The kind of container being managed.
    pub entity_type: ContainerKind,
    /// Target id, required for `update`/`delete`.
    pub id: Option<String>,
    /// Name (projects/features) or title (tasks), required for `create`.
    pub name: Option<String>,
    /// Summary text.
    pub summary: Option<String>,
    /// Longer-form description. Pass an empty string to clear an existing
    /// description on `update`.
    pub description: Option<String>,
    /// Status to set. Validated by the workflow engine.
    pub status: Option<String>,
    /// Priority (features/tasks only).
    pub priority: Option<String>,
    /// Complexity 1-10 (tasks only).
    pub complexity: Option<u8>,
    /// Owning project id (features/tasks).
    pub project_id: Option<String>,
    /// Owning feature id (tasks only).
    pub feature_id: Option<String>,
    /// Replacement tag set.
    pub tags: Option<Vec<String>>,
    /// Template ids to materialize onto the container at creation time.
    pub template_ids: Option<Vec<String>>,
}

/// `query_container` operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContainerQuery {
    /// Fetch a single container by id.
    Get,
    /// List/search containers with filters.
    List,
}

/// Parameters for `query_container`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryContainerParams {
    /// Which query to perform.
    pub operation: ContainerQuery,
    /// The kind of container being queried.
    pub entity_type: ContainerKind,
    /// Target id, required for `get`.
    pub id: Option<String>,
    /// Status filter: comma-separated, `!` negates (e.g. `"open,!closed"`).
    pub status: Option<String>,
    /// Priority filter, same comma/`!` syntax.
    pub priority: Option<String>,
    /// Required tags (AND, case-insensitive).
    pub tags: Option<Vec<String>>,
    /// Case-insensitive substring match over name/title/summary/content.
    pub text_query: Option<String>,
    /// Restrict to children of this project id (features/tasks).
    pub project_id: Option<String>,
    /// Restrict to children of this feature id (tasks).
    pub feature_id: Option<String>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

/// `manage_sections` operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SectionOperation {
    /// Add a new section.
    Add,
    /// Update an existing section.
    Update,
    /// Delete a section.
    Delete,
    /// Reorder all sections on an entity.
    Reorder,
}

/// Parameters for `manage_sections`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ManageSectionsParams {
    /// Which operation to perform.
    pub operation: SectionOperation,
    /// The owning entity's kind.
    pub entity_type: ContainerKind,
    /// The owning entity's id.
    pub entity_id: String,
    /// Target section id, required for `update`/`delete`.
    pub section_id: Option<String>,
    /// Section title.
    pub title: Option<String>,
    /// Short usage guidance shown to agents consuming the section.
    pub usage_description: Option<String>,
    /// Section content.
    pub content: Option<String>,
    /// Content format: `markdown`, `plain_text`, `json`, or `code`.
    pub content_format: Option<String>,
    /// Replacement tag set.
    pub tags: Option<Vec<String>>,
    /// Full ordered list of section ids, required for `reorder`.
    pub ordered_ids: Option<Vec<String>>,
}

/// Parameters for `query_sections`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QuerySectionsParams {
    /// The owning entity's kind.
    pub entity_type: ContainerKind,
    /// The owning entity's id.
    pub entity_id: String,
    /// Required tags (AND, case-insensitive).
    pub tags: Option<Vec<String>>,
    /// Case-insensitive substring match over title/content.
    pub text_query: Option<String>,
}

/// `manage_template` operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TemplateOperation {
    /// Create a new user-defined template.
    Create,
    /// Enable/disable or rename/redescribe a template.
    Update,
    /// Delete a non-built-in template.
    Delete,
}

/// Parameters for `manage_template`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ManageTemplateParams {
    /// Which operation to perform.
    pub operation: TemplateOperation,
    /// Target template id, required for `update`/`delete`.
    pub id: Option<String>,
    /// Template name, required for `create`.
    pub name: Option<String>,
    /// Template description.
    pub description: Option<String>,
    /// The entity kind this template targets, required for `create`.
    pub target_entity_type: Option<ContainerKind>,
    /// Whether the template is active, required for `create`.
    pub is_enabled: Option<bool>,
    /// Section prototypes, required for `create`.
    pub sections: Option<Vec<SectionPrototypeParams>>,
}

/// One section prototype within a template.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SectionPrototypeParams {
    /// Section title.
    pub title: String,
    /// Short usage guidance.
    pub usage_description: String,
    /// Prefab content.
    pub content: String,
    /// Content format: `markdown`, `plain_text`, `json`, or `code`.
    pub content_format: Option<String>,
    /// Tags to carry onto materialized sections.
    pub tags: Option<Vec<String>>,
}

/// Parameters for `query_templates`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct QueryTemplatesParams {
    /// Restrict to templates targeting this entity kind.
    pub target_entity_type: Option<ContainerKind>,
    /// Include disabled templates.
    pub include_disabled: Option<bool>,
}

/// Parameters for `apply_template`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ApplyTemplateParams {
    /// Template ids to apply, in order.
    pub template_ids: Vec<String>,
    /// The target entity's kind.
    pub entity_type: ContainerKind,
    /// The target entity's id.
    pub entity_id: String,
    /// How to resolve a title collision with an existing section:
    /// `skip_duplicate` (default), `overwrite`, or `error`.
    pub mode: Option<String>,
}

/// `manage_dependency` operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DependencyOperation {
    /// Add a dependency edge between two tasks.
    Add,
    /// Remove a dependency edge.
    Remove,
}

/// Parameters for `manage_dependency`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ManageDependencyParams {
    /// Which operation to perform.
    pub operation: DependencyOperation,
    /// The dependent task's id.
    pub from_task_id: String,
    /// The prerequisite/related task's id.
    pub to_task_id: String,
    /// `blocks`, `relates_to`, or `is_blocked_by`. Required for `add`.
    pub dependency_type: Option<String>,
}

/// `query_dependencies` operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DependencyQuery {
    /// Edges incoming to a task.
    Incoming,
    /// Edges outgoing from a task.
    Outgoing,
    /// Unresolved upstream blockers for a task.
    Blockers,
    /// Topological execution batches for a project or feature's tasks.
    Batches,
}

/// Parameters for `query_dependencies`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryDependenciesParams {
    /// Which query to perform.
    pub operation: DependencyQuery,
    /// The task id (required for `incoming`/`outgoing`/`blockers`).
    pub task_id: Option<String>,
    /// The project id scoping a `batches` query.
    pub project_id: Option<String>,
    /// The feature id scoping a `batches` query.
    pub feature_id: Option<String>,
}

/// Parameters for `list_tags`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListTagsParams {
    /// Sort order: `count` (default, descending) or `alpha`.
    pub sort: Option<String>,
}

/// Parameters for `rename_tag`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RenameTagParams {
    /// The existing tag (case-insensitive match).
    pub from: String,
    /// The replacement tag text.
    pub to: String,
}

/// Parameters for `get_tag_usage`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetTagUsageParams {
    /// The tag to report usage for (case-insensitive match).
    pub tag: String,
}

/// Parameters for `get_next_status`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetNextStatusParams {
    /// The entity's kind.
    pub entity_type: ContainerKind,
    /// The entity's id.
    pub entity_id: String,
}

/// Parameters for `rebuild_vault`. Takes no fields but is still a typed
/// struct so its schema round-trips through `schemars` like every other
/// tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct RebuildVaultParams {}
