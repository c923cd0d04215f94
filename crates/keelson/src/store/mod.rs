//! Entity store: per-entity CRUD, filtered finders, sections, templates,
//! dependencies, and tag operations over the sled-backed database.

pub mod filter;
pub mod sled_store;

pub use filter::{PriorityFilter, StatusFilter};
pub use sled_store::SledStore;

use crate::domain::{
    ContentFormat, Dependency, DependencyType, EntityType, Feature, FeatureFilter, FeatureUpdate,
    NewDependency, NewFeature, NewProject, NewSection, NewTask, NewTemplate, Project,
    ProjectFilter, ProjectUpdate, Section, SectionFilter, SectionUpdate, TagUsage, Task,
    TaskFilter, TaskUpdate, Template,
};
use crate::domain::tag::TagSortOrder;
use crate::error::{ErrorKind, Result};
use crate::id::EntityId;
use async_trait::async_trait;

/// Outcome of a mutating store call: either the resulting value, or a typed
/// error kind with a human-readable message. `delete` uses `Result<bool>`
/// directly instead, since a missing id is not an error condition for it.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The operation succeeded.
    Success(T),
    /// The operation failed with the given kind and message.
    Error(ErrorKind, String),
}

impl<T> Outcome<T> {
    /// True if this is a [`Outcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Convert into a `Result`, discarding the structured error kind.
    pub fn into_result(self) -> std::result::Result<T, String> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Error(_, msg) => Err(msg),
        }
    }
}

/// A non-terminal-status upstream BLOCKS dependency preventing a task from
/// proceeding, as reported by `query_dependencies.blockers`.
#[derive(Debug, Clone)]
pub struct BlockerInfo {
    /// The blocking task's id.
    pub task_id: EntityId,
    /// The blocking task's title.
    pub title: String,
    /// The blocking task's current status.
    pub status: crate::domain::Status,
}

/// A terminal-status predicate supplied by the workflow engine, so the store
/// (and dependency graph) never need to parse workflow configuration.
pub type IsTerminal = dyn Fn(&crate::domain::Status) -> bool + Send + Sync;

/// Scope over which dependency batches are computed.
#[derive(Debug, Clone, Copy)]
pub enum BatchScope {
    /// All tasks owned by a project (including tasks owned through its
    /// features).
    Project(EntityId),
    /// All tasks owned by a feature.
    Feature(EntityId),
}

/// Core entity-store trait. Implementations must be `Send + Sync`.
///
/// Every mutating method runs in one store-level transaction; reads observe
/// a consistent snapshot but never block other entities' mutations, and
/// per-row updates are serialized by the backing store.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // ---- Projects ----

    /// Create a project, optionally materializing `new.template_ids` onto it
    /// in the same transaction. `initial_status` is supplied by the workflow
    /// engine (the store itself has no opinion on flow configuration).
    async fn create_project(
        &self,
        new: NewProject,
        initial_status: crate::domain::Status,
    ) -> Outcome<Project>;
    /// Fetch a project by id.
    async fn get_project(&self, id: EntityId) -> Result<Option<Project>>;
    /// Apply a partial update to an existing project.
    async fn update_project(&self, id: EntityId, update: ProjectUpdate) -> Outcome<Project>;
    /// Delete a project, cascading to its features, their tasks, and all
    /// owned sections/dependency references.
    async fn delete_project(&self, id: EntityId) -> Result<bool>;
    /// Fetch up to `limit` projects (no filtering).
    async fn find_all_projects(&self, limit: Option<usize>) -> Result<Vec<Project>>;
    /// Fetch projects matching `filter`.
    async fn find_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>>;

    // ---- Features ----

    /// Create a feature. See [`EntityStore::create_project`] for the
    /// `initial_status`/template semantics.
    async fn create_feature(
        &self,
        new: NewFeature,
        initial_status: crate::domain::Status,
    ) -> Outcome<Feature>;
    /// Fetch a feature by id.
    async fn get_feature(&self, id: EntityId) -> Result<Option<Feature>>;
    /// Apply a partial update. Changing `project_id` is an observable move.
    async fn update_feature(&self, id: EntityId, update: FeatureUpdate) -> Outcome<Feature>;
    /// Delete a feature, cascading to its tasks and owned sections.
    async fn delete_feature(&self, id: EntityId) -> Result<bool>;
    /// Fetch up to `limit` features (no filtering).
    async fn find_all_features(&self, limit: Option<usize>) -> Result<Vec<Feature>>;
    /// Fetch features matching `filter`.
    async fn find_features(&self, filter: &FeatureFilter) -> Result<Vec<Feature>>;

    // ---- Tasks ----

    /// Create a task. See [`EntityStore::create_project`] for the
    /// `initial_status`/template semantics. `project_id` is inherited from
    /// `new.feature_id`'s owner when `new.project_id` is `None`.
    async fn create_task(
        &self,
        new: NewTask,
        initial_status: crate::domain::Status,
    ) -> Outcome<Task>;
    /// Fetch a task by id.
    async fn get_task(&self, id: EntityId) -> Result<Option<Task>>;
    /// Apply a partial update.
    async fn update_task(&self, id: EntityId, update: TaskUpdate) -> Outcome<Task>;
    /// Delete a task, cascading to its owned sections and dependency edges.
    async fn delete_task(&self, id: EntityId) -> Result<bool>;
    /// Fetch up to `limit` tasks (no filtering).
    async fn find_all_tasks(&self, limit: Option<usize>) -> Result<Vec<Task>>;
    /// Fetch tasks matching `filter`.
    async fn find_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    // ---- Sections ----

    /// Add a section to an entity, assigning an ordinal after the current
    /// max if `new.ordinal` is `None`.
    async fn add_section(&self, new: NewSection) -> Outcome<Section>;
    /// Fetch a section by id.
    async fn get_section(&self, id: EntityId) -> Result<Option<Section>>;
    /// Apply a partial update to a section's content and/or metadata.
    async fn update_section(&self, id: EntityId, update: SectionUpdate) -> Outcome<Section>;
    /// Delete a single section.
    async fn delete_section(&self, id: EntityId) -> Result<bool>;
    /// Reassign ordinals for `entity_id`'s sections to match `ordered_ids`.
    async fn reorder_sections(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        ordered_ids: Vec<EntityId>,
    ) -> Outcome<Vec<Section>>;
    /// List sections owned by `(entity_type, entity_id)`, ascending ordinal.
    async fn list_sections(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        filter: &SectionFilter,
    ) -> Result<Vec<Section>>;

    // ---- Templates ----

    /// Create a user-defined template.
    async fn create_template(&self, new: NewTemplate) -> Outcome<Template>;
    /// Fetch a template by id.
    async fn get_template(&self, id: EntityId) -> Result<Option<Template>>;
    /// Enable/disable a template, or (for non-built-in templates) rename it
    /// or replace its description. Built-in template sections are immutable.
    async fn update_template(
        &self,
        id: EntityId,
        name: Option<String>,
        description: Option<String>,
        is_enabled: Option<bool>,
    ) -> Outcome<Template>;
    /// Delete a user-defined template. Built-in templates cannot be deleted.
    async fn delete_template(&self, id: EntityId) -> Result<bool>;
    /// List templates, optionally restricted to one target entity type.
    async fn list_templates(
        &self,
        target_type: Option<EntityType>,
        enabled_only: bool,
    ) -> Result<Vec<Template>>;

    // ---- Dependencies ----

    /// Add a directed dependency edge.
    async fn add_dependency(&self, new: NewDependency) -> Outcome<Dependency>;
    /// Remove a dependency edge by its own id.
    async fn remove_dependency_by_id(&self, id: EntityId) -> Result<bool>;
    /// Remove a dependency edge by its `(from, to, type)` triple.
    async fn remove_dependency(
        &self,
        from: EntityId,
        to: EntityId,
        dep_type: DependencyType,
    ) -> Result<bool>;
    /// Edges where `task_id` is the target (things blocking/relating to it).
    async fn incoming(&self, task_id: EntityId) -> Result<Vec<Dependency>>;
    /// Edges where `task_id` is the source.
    async fn outgoing(&self, task_id: EntityId) -> Result<Vec<Dependency>>;
    /// Non-blocking `RELATES_TO` edges touching `task_id` in either
    /// direction.
    async fn related(&self, task_id: EntityId) -> Result<Vec<Dependency>>;
    /// Non-terminal-status upstream BLOCKS dependencies for `task_id`.
    /// `is_terminal` is the workflow engine's compiled terminal-status test,
    /// kept out of the store so it stays unaware of flow configuration.
    async fn blockers(
        &self,
        task_id: EntityId,
        is_terminal: &IsTerminal,
    ) -> Result<Vec<BlockerInfo>>;
    /// Compute the topologically ordered execution batches for `scope`. See
    /// [`EntityStore::blockers`] for why `is_terminal` is passed in.
    async fn batches(
        &self,
        scope: BatchScope,
        is_terminal: &IsTerminal,
    ) -> Result<Vec<Vec<EntityId>>>;

    // ---- Tags ----

    /// List all tags in use with their counts, in the given sort order.
    async fn list_tags(&self, sort: TagSortOrder) -> Result<Vec<TagUsage>>;
    /// Usage report for a single tag.
    async fn tag_usage(&self, tag: &str) -> Result<TagUsage>;
    /// Atomically relabel every occurrence of `from` to `to` across all
    /// entities. Returns the number of entities changed.
    async fn rename_tag(&self, from: &str, to: &str) -> Outcome<usize>;
}

/// Shared helper: does `text` contain `query` case-insensitively?
pub(crate) fn text_matches(haystacks: &[&str], query: &str) -> bool {
    let query = query.to_lowercase();
    haystacks
        .iter()
        .any(|h| h.to_lowercase().contains(&query))
}

/// Shared helper: infer the rendering format default used when a section's
/// prototype doesn't specify one explicitly (always does today, kept as a
/// named constant for call sites that need a fallback).
pub const DEFAULT_CONTENT_FORMAT: ContentFormat = ContentFormat::Markdown;
