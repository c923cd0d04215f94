//! `sled`-backed implementation of [`EntityStore`].
//!
//! One [`sled::Tree`] per entity kind, keyed by [`EntityId::as_bytes`] and
//! holding `serde_json`-encoded rows. A `meta` tree carries a schema version
//! for future migrations. Cross-row invariants (dependency cycle checks, tag
//! rename, cascade deletes) are serialized through `mutation_lock` rather
//! than sled's declarative transaction API, since they span multiple trees
//! and a single async-friendly mutex is simpler to reason about than nested
//! transactional closures for the scale this store targets.

use crate::domain::{
    ContentFormat, Dependency, DependencyType, EntityType, Feature, FeatureFilter, FeatureUpdate,
    NewDependency, NewFeature, NewProject, NewSection, NewSectionPrototype, NewTask, NewTemplate,
    Project, ProjectFilter, ProjectUpdate, Section, SectionFilter, SectionUpdate, Status,
    Tags, TagUsage, Task, TaskFilter, TaskUpdate, Template,
};
use crate::domain::tag::TagSortOrder;
use crate::error::{Error, ErrorKind, Result, StoreError};
use crate::graph;
use crate::id::EntityId;
use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tokio::sync::Mutex;

use super::{text_matches, BatchScope, BlockerInfo, EntityStore, IsTerminal, Outcome};

const SCHEMA_VERSION: u64 = 1;
const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

/// Embedded entity store backed by a `sled::Db`.
pub struct SledStore {
    #[allow(dead_code)]
    db: sled::Db,
    meta: sled::Tree,
    projects: sled::Tree,
    features: sled::Tree,
    tasks: sled::Tree,
    sections: sled::Tree,
    templates: sled::Tree,
    dependencies: sled::Tree,
    /// Serializes multi-row operations (dependency cycle checks, cascade
    /// deletes, bulk tag rename) that read-then-write across several trees.
    mutation_lock: Mutex<()>,
}

impl SledStore {
    /// Open (creating if needed) a sled database at `path`, running schema
    /// migrations and seeding built-in templates on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or a tree cannot be
    /// created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path).map_err(StoreError::Database)?;
        let meta = db.open_tree("meta").map_err(StoreError::Database)?;
        let projects = db.open_tree("projects").map_err(StoreError::Database)?;
        let features = db.open_tree("features").map_err(StoreError::Database)?;
        let tasks = db.open_tree("tasks").map_err(StoreError::Database)?;
        let sections = db.open_tree("sections").map_err(StoreError::Database)?;
        let templates = db.open_tree("templates").map_err(StoreError::Database)?;
        let dependencies = db.open_tree("dependencies").map_err(StoreError::Database)?;

        let store = Self {
            db,
            meta,
            projects,
            features,
            tasks,
            sections,
            templates,
            dependencies,
            mutation_lock: Mutex::new(()),
        };
        store.migrate()?;
        store.seed_builtin_templates()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        if self.meta.get(SCHEMA_VERSION_KEY).map_err(StoreError::Database)?.is_none() {
            self.meta
                .insert(SCHEMA_VERSION_KEY, &SCHEMA_VERSION.to_be_bytes())
                .map_err(StoreError::Database)?;
        }
        Ok(())
    }

    fn seed_builtin_templates(&self) -> Result<()> {
        if !self.templates.is_empty() {
            return Ok(());
        }
        for template in builtin_templates() {
            self.put(&self.templates, template.id, &template)?;
        }
        Ok(())
    }

    // ---- generic tree helpers ----

    fn put<T: Serialize>(&self, tree: &sled::Tree, id: EntityId, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(StoreError::Serialization)?;
        tree.insert(id.as_bytes(), bytes).map_err(StoreError::Database)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, tree: &sled::Tree, id: EntityId) -> Result<Option<T>> {
        match tree.get(id.as_bytes()).map_err(StoreError::Database)? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(StoreError::Serialization)?,
            )),
            None => Ok(None),
        }
    }

    fn remove(&self, tree: &sled::Tree, id: EntityId) -> Result<bool> {
        Ok(tree.remove(id.as_bytes()).map_err(StoreError::Database)?.is_some())
    }

    fn scan_all<T: DeserializeOwned>(&self, tree: &sled::Tree) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for entry in tree.iter() {
            let (_, bytes) = entry.map_err(StoreError::Database)?;
            out.push(serde_json::from_slice(&bytes).map_err(StoreError::Serialization)?);
        }
        Ok(out)
    }

    // ---- cross-entity helpers ----

    fn get_project_row(&self, id: EntityId) -> Result<Option<Project>> {
        self.get(&self.projects, id)
    }

    fn get_feature_row(&self, id: EntityId) -> Result<Option<Feature>> {
        self.get(&self.features, id)
    }

    fn get_task_row(&self, id: EntityId) -> Result<Option<Task>> {
        self.get(&self.tasks, id)
    }

    fn get_template_row(&self, id: EntityId) -> Result<Option<Template>> {
        self.get(&self.templates, id)
    }

    fn all_dependencies(&self) -> Result<Vec<Dependency>> {
        self.scan_all(&self.dependencies)
    }

    fn sections_for(&self, entity_type: EntityType, entity_id: EntityId) -> Result<Vec<Section>> {
        let mut all: Vec<Section> = self.scan_all(&self.sections)?;
        all.retain(|s| s.entity_type == entity_type && s.entity_id == entity_id);
        all.sort_by_key(|s| s.ordinal);
        Ok(all)
    }

    fn delete_sections_for(&self, entity_type: EntityType, entity_id: EntityId) -> Result<()> {
        let to_delete: Vec<EntityId> = self
            .sections_for(entity_type, entity_id)?
            .into_iter()
            .map(|s| s.id)
            .collect();
        for id in to_delete {
            self.remove(&self.sections, id)?;
        }
        Ok(())
    }

    fn delete_dependencies_touching(&self, task_id: EntityId) -> Result<()> {
        let doomed: Vec<EntityId> = self
            .all_dependencies()?
            .into_iter()
            .filter(|d| d.from == task_id || d.to == task_id)
            .map(|d| d.id)
            .collect();
        for id in doomed {
            self.remove(&self.dependencies, id)?;
        }
        Ok(())
    }

    /// Delete a task and everything it owns, without taking `mutation_lock`
    /// itself (callers already hold it).
    fn delete_task_cascade(&self, id: EntityId) -> Result<bool> {
        if self.remove(&self.tasks, id)? {
            self.delete_sections_for(EntityType::Task, id)?;
            self.delete_dependencies_touching(id)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn delete_feature_cascade(&self, id: EntityId) -> Result<bool> {
        let child_tasks: Vec<EntityId> = self
            .scan_all::<Task>(&self.tasks)?
            .into_iter()
            .filter(|t| t.feature_id == Some(id))
            .map(|t| t.id)
            .collect();
        for task_id in child_tasks {
            self.delete_task_cascade(task_id)?;
        }
        if self.remove(&self.features, id)? {
            self.delete_sections_for(EntityType::Feature, id)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn load_templates_for(
        &self,
        entity_type: EntityType,
        ids: &[EntityId],
    ) -> std::result::Result<Vec<Template>, (ErrorKind, String)> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_template_row(*id).map_err(|e| (e.kind(), e.to_string()))? {
                Some(t) if t.target_entity_type == entity_type => out.push(t),
                Some(t) => {
                    return Err((
                        ErrorKind::ValidationError,
                        format!(
                            "template '{}' targets {:?}, cannot apply to {:?}",
                            t.name, t.target_entity_type, entity_type
                        ),
                    ))
                }
                None => {
                    return Err((ErrorKind::NotFound, format!("template not found: {id}")))
                }
            }
        }
        Ok(out)
    }

    /// Materialize section prototypes from `templates` onto a freshly
    /// created entity. Since the entity has no pre-existing sections, a
    /// duplicate title can only arise between two of the templates passed
    /// here; the first template supplying a given (case-insensitive) title
    /// wins, matching implicit-apply-on-create's "no reconciliation needed"
    /// framing. The explicit `apply_templates` tool op (with its
    /// skip/overwrite/error modes against possibly-nonempty targets) lives
    /// in the template engine, not here.
    fn materialize_sections(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        templates: &[Template],
    ) -> std::result::Result<(), (ErrorKind, String)> {
        let mut seen = std::collections::HashSet::new();
        let mut ordinal = 0u32;
        for template in templates {
            for proto in &template.sections {
                if !seen.insert(proto.title.to_lowercase()) {
                    continue;
                }
                let section = Section {
                    id: EntityId::new(),
                    entity_type,
                    entity_id,
                    title: proto.title.clone(),
                    usage_description: proto.usage_description.clone(),
                    content: proto.content.clone(),
                    content_format: proto.content_format,
                    ordinal,
                    tags: Tags::from_iter_dedup(proto.tags.clone()),
                };
                ordinal += 1;
                self.put(&self.sections, section.id, &section)
                    .map_err(|e| (e.kind(), e.to_string()))?;
            }
        }
        Ok(())
    }

    fn text_over(haystacks: &[&str], query: &Option<String>) -> bool {
        match query {
            Some(q) => text_matches(haystacks, q),
            None => true,
        }
    }
}

#[async_trait]
impl EntityStore for SledStore {
    // ---- Projects ----

    async fn create_project(
        &self,
        new: NewProject,
        initial_status: Status,
    ) -> Outcome<Project> {
        if let Err(msg) = new.validate() {
            return Outcome::Error(ErrorKind::ValidationError, msg);
        }
        let templates = if new.template_ids.is_empty() {
            Vec::new()
        } else {
            match self.load_templates_for(EntityType::Project, &new.template_ids) {
                Ok(t) => t,
                Err((kind, msg)) => return Outcome::Error(kind, msg),
            }
        };

        let now = Utc::now();
        let project = Project {
            id: EntityId::new(),
            name: new.name,
            summary: new.summary,
            description: new.description,
            status: initial_status,
            tags: Tags::from_iter_dedup(new.tags),
            created_at: now,
            modified_at: now,
        };
        if let Err(e) = self.put(&self.projects, project.id, &project) {
            return Outcome::Error(e.kind(), e.to_string());
        }
        if let Err((kind, msg)) =
            self.materialize_sections(EntityType::Project, project.id, &templates)
        {
            return Outcome::Error(kind, msg);
        }
        Outcome::Success(project)
    }

    async fn get_project(&self, id: EntityId) -> Result<Option<Project>> {
        self.get_project_row(id)
    }

    async fn update_project(&self, id: EntityId, update: ProjectUpdate) -> Outcome<Project> {
        let mut project = match self.get_project_row(id) {
            Ok(Some(p)) => p,
            Ok(None) => return Outcome::Error(ErrorKind::NotFound, format!("project not found: {id}")),
            Err(e) => return Outcome::Error(e.kind(), e.to_string()),
        };
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Outcome::Error(ErrorKind::ValidationError, "name cannot be empty".to_string());
            }
            project.name = name;
        }
        if let Some(summary) = update.summary {
            project.summary = summary;
        }
        if let Some(description) = update.description {
            project.description = description;
        }
        if let Some(status) = update.status {
            project.status = status;
        }
        if let Some(tags) = update.tags {
            project.tags = Tags::from_iter_dedup(tags);
        }
        project.modified_at = Utc::now();
        if let Err(e) = self.put(&self.projects, id, &project) {
            return Outcome::Error(e.kind(), e.to_string());
        }
        Outcome::Success(project)
    }

    async fn delete_project(&self, id: EntityId) -> Result<bool> {
        let _guard = self.mutation_lock.lock().await;
        let child_features: Vec<EntityId> = self
            .scan_all::<Feature>(&self.features)?
            .into_iter()
            .filter(|f| f.project_id == Some(id))
            .map(|f| f.id)
            .collect();
        for feature_id in child_features {
            self.delete_feature_cascade(feature_id)?;
        }
        let direct_tasks: Vec<EntityId> = self
            .scan_all::<Task>(&self.tasks)?
            .into_iter()
            .filter(|t| t.project_id == Some(id) && t.feature_id.is_none())
            .map(|t| t.id)
            .collect();
        for task_id in direct_tasks {
            self.delete_task_cascade(task_id)?;
        }
        let removed = self.remove(&self.projects, id)?;
        if removed {
            self.delete_sections_for(EntityType::Project, id)?;
        }
        Ok(removed)
    }

    async fn find_all_projects(&self, limit: Option<usize>) -> Result<Vec<Project>> {
        let mut all = self.scan_all::<Project>(&self.projects)?;
        all.sort_by_key(|p| p.created_at);
        if let Some(limit) = limit {
            all.truncate(limit);
        }
        Ok(all)
    }

    async fn find_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>> {
        let mut all = self.scan_all::<Project>(&self.projects)?;
        all.retain(|p| {
            filter.status.matches(&p.status)
                && p.tags.contains_all(&filter.required_tags)
                && Self::text_over(
                    &[&p.name, &p.summary, p.description.as_deref().unwrap_or("")],
                    &filter.text_query,
                )
        });
        all.sort_by_key(|p| p.created_at);
        if let Some(limit) = filter.limit {
            all.truncate(limit);
        }
        Ok(all)
    }

    // ---- Features ----

    async fn create_feature(
        &self,
        new: NewFeature,
        initial_status: Status,
    ) -> Outcome<Feature> {
        if let Err(msg) = new.validate() {
            return Outcome::Error(ErrorKind::ValidationError, msg);
        }
        let templates = if new.template_ids.is_empty() {
            Vec::new()
        } else {
            match self.load_templates_for(EntityType::Feature, &new.template_ids) {
                Ok(t) => t,
                Err((kind, msg)) => return Outcome::Error(kind, msg),
            }
        };
        let now = Utc::now();
        let feature = Feature {
            id: EntityId::new(),
            name: new.name,
            summary: new.summary,
            description: new.description,
            status: initial_status,
            priority: new.priority,
            project_id: new.project_id,
            tags: Tags::from_iter_dedup(new.tags),
            created_at: now,
            modified_at: now,
        };
        if let Err(e) = self.put(&self.features, feature.id, &feature) {
            return Outcome::Error(e.kind(), e.to_string());
        }
        if let Err((kind, msg)) =
            self.materialize_sections(EntityType::Feature, feature.id, &templates)
        {
            return Outcome::Error(kind, msg);
        }
        Outcome::Success(feature)
    }

    async fn get_feature(&self, id: EntityId) -> Result<Option<Feature>> {
        self.get_feature_row(id)
    }

    async fn update_feature(&self, id: EntityId, update: FeatureUpdate) -> Outcome<Feature> {
        let mut feature = match self.get_feature_row(id) {
            Ok(Some(f)) => f,
            Ok(None) => return Outcome::Error(ErrorKind::NotFound, format!("feature not found: {id}")),
            Err(e) => return Outcome::Error(e.kind(), e.to_string()),
        };
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Outcome::Error(ErrorKind::ValidationError, "name cannot be empty".to_string());
            }
            feature.name = name;
        }
        if let Some(summary) = update.summary {
            feature.summary = summary;
        }
        if let Some(description) = update.description {
            feature.description = description;
        }
        if let Some(status) = update.status {
            feature.status = status;
        }
        if let Some(priority) = update.priority {
            feature.priority = priority;
        }
        if let Some(project_id) = update.project_id {
            feature.project_id = project_id;
        }
        if let Some(tags) = update.tags {
            feature.tags = Tags::from_iter_dedup(tags);
        }
        feature.modified_at = Utc::now();
        if let Err(e) = self.put(&self.features, id, &feature) {
            return Outcome::Error(e.kind(), e.to_string());
        }
        Outcome::Success(feature)
    }

    async fn delete_feature(&self, id: EntityId) -> Result<bool> {
        let _guard = self.mutation_lock.lock().await;
        self.delete_feature_cascade(id)
    }

    async fn find_all_features(&self, limit: Option<usize>) -> Result<Vec<Feature>> {
        let mut all = self.scan_all::<Feature>(&self.features)?;
        all.sort_by_key(|f| f.created_at);
        if let Some(limit) = limit {
            all.truncate(limit);
        }
        Ok(all)
    }

    async fn find_features(&self, filter: &FeatureFilter) -> Result<Vec<Feature>> {
        let mut all = self.scan_all::<Feature>(&self.features)?;
        all.retain(|f| {
            filter.status.matches(&f.status)
                && filter.priority.matches(f.priority)
                && f.tags.contains_all(&filter.required_tags)
                && filter.project_id.is_none_or(|p| f.project_id == Some(p))
                && Self::text_over(
                    &[&f.name, &f.summary, f.description.as_deref().unwrap_or("")],
                    &filter.text_query,
                )
        });
        all.sort_by_key(|f| f.created_at);
        if let Some(limit) = filter.limit {
            all.truncate(limit);
        }
        Ok(all)
    }

    // ---- Tasks ----

    async fn create_task(&self, new: NewTask, initial_status: Status) -> Outcome<Task> {
        if let Err(msg) = new.validate() {
            return Outcome::Error(ErrorKind::ValidationError, msg);
        }
        let templates = if new.template_ids.is_empty() {
            Vec::new()
        } else {
            match self.load_templates_for(EntityType::Task, &new.template_ids) {
                Ok(t) => t,
                Err((kind, msg)) => return Outcome::Error(kind, msg),
            }
        };

        let project_id = match (new.project_id, new.feature_id) {
            (Some(p), _) => Some(p),
            (None, Some(feature_id)) => match self.get_feature_row(feature_id) {
                Ok(Some(f)) => f.project_id,
                Ok(None) => {
                    return Outcome::Error(
                        ErrorKind::ValidationError,
                        format!("feature not found: {feature_id}"),
                    )
                }
                Err(e) => return Outcome::Error(e.kind(), e.to_string()),
            },
            (None, None) => None,
        };

        let now = Utc::now();
        let task = Task {
            id: EntityId::new(),
            title: new.title,
            summary: new.summary,
            description: new.description,
            status: initial_status,
            priority: new.priority,
            complexity: new.complexity,
            tags: Tags::from_iter_dedup(new.tags),
            feature_id: new.feature_id,
            project_id,
            created_at: now,
            modified_at: now,
        };
        if let Err(e) = self.put(&self.tasks, task.id, &task) {
            return Outcome::Error(e.kind(), e.to_string());
        }
        if let Err((kind, msg)) = self.materialize_sections(EntityType::Task, task.id, &templates) {
            return Outcome::Error(kind, msg);
        }
        Outcome::Success(task)
    }

    async fn get_task(&self, id: EntityId) -> Result<Option<Task>> {
        self.get_task_row(id)
    }

    async fn update_task(&self, id: EntityId, update: TaskUpdate) -> Outcome<Task> {
        let mut task = match self.get_task_row(id) {
            Ok(Some(t)) => t,
            Ok(None) => return Outcome::Error(ErrorKind::NotFound, format!("task not found: {id}")),
            Err(e) => return Outcome::Error(e.kind(), e.to_string()),
        };
        if let Some(title) = update.title {
            if title.trim().is_empty() {
                return Outcome::Error(ErrorKind::ValidationError, "title cannot be empty".to_string());
            }
            task.title = title;
        }
        if let Some(summary) = update.summary {
            task.summary = summary;
        }
        if let Some(description) = update.description {
            task.description = description;
        }
        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(complexity) = update.complexity {
            if !(crate::domain::task::MIN_COMPLEXITY..=crate::domain::task::MAX_COMPLEXITY)
                .contains(&complexity)
            {
                return Outcome::Error(
                    ErrorKind::ValidationError,
                    format!("complexity must be in range 1-10 (got {complexity})"),
                );
            }
            task.complexity = complexity;
        }
        if let Some(feature_id) = update.feature_id {
            task.feature_id = feature_id;
        }
        if let Some(project_id) = update.project_id {
            task.project_id = project_id;
        }
        if let Some(tags) = update.tags {
            task.tags = Tags::from_iter_dedup(tags);
        }
        task.modified_at = Utc::now();
        if let Err(e) = self.put(&self.tasks, id, &task) {
            return Outcome::Error(e.kind(), e.to_string());
        }
        Outcome::Success(task)
    }

    async fn delete_task(&self, id: EntityId) -> Result<bool> {
        let _guard = self.mutation_lock.lock().await;
        self.delete_task_cascade(id)
    }

    async fn find_all_tasks(&self, limit: Option<usize>) -> Result<Vec<Task>> {
        let mut all = self.scan_all::<Task>(&self.tasks)?;
        all.sort_by_key(|t| t.created_at);
        if let Some(limit) = limit {
            all.truncate(limit);
        }
        Ok(all)
    }

    async fn find_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut all = self.scan_all::<Task>(&self.tasks)?;
        all.retain(|t| {
            filter.status.matches(&t.status)
                && filter.priority.matches(t.priority)
                && t.tags.contains_all(&filter.required_tags)
                && filter.project_id.is_none_or(|p| t.project_id == Some(p))
                && filter.feature_id.is_none_or(|f| t.feature_id == Some(f))
                && Self::text_over(
                    &[&t.title, &t.summary, t.description.as_deref().unwrap_or("")],
                    &filter.text_query,
                )
        });
        all.sort_by_key(|t| t.created_at);
        if let Some(limit) = filter.limit {
            all.truncate(limit);
        }
        Ok(all)
    }

    // ---- Sections ----

    async fn add_section(&self, new: NewSection) -> Outcome<Section> {
        if let Err(msg) = new.validate() {
            return Outcome::Error(ErrorKind::ValidationError, msg);
        }
        let ordinal = match new.ordinal {
            Some(o) => o,
            None => {
                let existing = match self.sections_for(new.entity_type, new.entity_id) {
                    Ok(s) => s,
                    Err(e) => return Outcome::Error(e.kind(), e.to_string()),
                };
                existing.iter().map(|s| s.ordinal).max().map_or(0, |m| m + 1)
            }
        };
        let section = Section {
            id: EntityId::new(),
            entity_type: new.entity_type,
            entity_id: new.entity_id,
            title: new.title,
            usage_description: new.usage_description,
            content: new.content,
            content_format: new.content_format,
            ordinal,
            tags: Tags::from_iter_dedup(new.tags),
        };
        if let Err(e) = self.put(&self.sections, section.id, &section) {
            return Outcome::Error(e.kind(), e.to_string());
        }
        Outcome::Success(section)
    }

    async fn get_section(&self, id: EntityId) -> Result<Option<Section>> {
        self.get(&self.sections, id)
    }

    async fn update_section(&self, id: EntityId, update: SectionUpdate) -> Outcome<Section> {
        let mut section = match self.get::<Section>(&self.sections, id) {
            Ok(Some(s)) => s,
            Ok(None) => return Outcome::Error(ErrorKind::NotFound, format!("section not found: {id}")),
            Err(e) => return Outcome::Error(e.kind(), e.to_string()),
        };
        if let Some(title) = update.title {
            if title.trim().is_empty() {
                return Outcome::Error(ErrorKind::ValidationError, "title cannot be empty".to_string());
            }
            section.title = title;
        }
        if let Some(usage) = update.usage_description {
            section.usage_description = usage;
        }
        if let Some(content) = update.content {
            section.content = content;
        }
        if let Some(format) = update.content_format {
            section.content_format = format;
        }
        if let Some(tags) = update.tags {
            section.tags = Tags::from_iter_dedup(tags);
        }
        if let Err(e) = self.put(&self.sections, id, &section) {
            return Outcome::Error(e.kind(), e.to_string());
        }
        Outcome::Success(section)
    }

    async fn delete_section(&self, id: EntityId) -> Result<bool> {
        self.remove(&self.sections, id)
    }

    async fn reorder_sections(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        ordered_ids: Vec<EntityId>,
    ) -> Outcome<Vec<Section>> {
        let _guard = self.mutation_lock.lock().await;
        let mut sections = match self.sections_for(entity_type, entity_id) {
            Ok(s) => s,
            Err(e) => return Outcome::Error(e.kind(), e.to_string()),
        };
        if ordered_ids.len() != sections.len()
            || !ordered_ids.iter().all(|id| sections.iter().any(|s| s.id == *id))
        {
            return Outcome::Error(
                ErrorKind::ValidationError,
                "ordered_ids must be a permutation of the entity's current sections".to_string(),
            );
        }
        for (ordinal, id) in ordered_ids.iter().enumerate() {
            if let Some(section) = sections.iter_mut().find(|s| s.id == *id) {
                section.ordinal = ordinal as u32;
                if let Err(e) = self.put(&self.sections, section.id, &*section) {
                    return Outcome::Error(e.kind(), e.to_string());
                }
            }
        }
        sections.sort_by_key(|s| s.ordinal);
        Outcome::Success(sections)
    }

    async fn list_sections(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        filter: &SectionFilter,
    ) -> Result<Vec<Section>> {
        let mut sections = self.sections_for(entity_type, entity_id)?;
        sections.retain(|s| {
            s.tags.contains_all(&filter.required_tags)
                && Self::text_over(&[&s.title, &s.content], &filter.text_query)
        });
        Ok(sections)
    }

    // ---- Templates ----

    async fn create_template(&self, new: NewTemplate) -> Outcome<Template> {
        if let Err(msg) = new.validate() {
            return Outcome::Error(ErrorKind::ValidationError, msg);
        }
        let template = Template {
            id: EntityId::new(),
            name: new.name,
            description: new.description,
            target_entity_type: new.target_entity_type.expect("validated above"),
            is_enabled: true,
            is_builtin: false,
            sections: new
                .sections
                .into_iter()
                .map(section_prototype_from_new)
                .collect(),
        };
        if let Err(e) = self.put(&self.templates, template.id, &template) {
            return Outcome::Error(e.kind(), e.to_string());
        }
        Outcome::Success(template)
    }

    async fn get_template(&self, id: EntityId) -> Result<Option<Template>> {
        self.get_template_row(id)
    }

    async fn update_template(
        &self,
        id: EntityId,
        name: Option<String>,
        description: Option<String>,
        is_enabled: Option<bool>,
    ) -> Outcome<Template> {
        let mut template = match self.get_template_row(id) {
            Ok(Some(t)) => t,
            Ok(None) => return Outcome::Error(ErrorKind::NotFound, format!("template not found: {id}")),
            Err(e) => return Outcome::Error(e.kind(), e.to_string()),
        };
        if (name.is_some() || description.is_some()) && template.is_builtin {
            return Outcome::Error(
                ErrorKind::ValidationError,
                "built-in templates cannot be renamed or redescribed".to_string(),
            );
        }
        if let Some(name) = name {
            template.name = name;
        }
        if let Some(description) = description {
            template.description = description;
        }
        if let Some(enabled) = is_enabled {
            template.is_enabled = enabled;
        }
        if let Err(e) = self.put(&self.templates, id, &template) {
            return Outcome::Error(e.kind(), e.to_string());
        }
        Outcome::Success(template)
    }

    async fn delete_template(&self, id: EntityId) -> Result<bool> {
        match self.get_template_row(id)? {
            Some(t) if t.is_builtin => Err(Error::Store(StoreError::Validation(
                "built-in templates cannot be deleted".to_string(),
            ))),
            Some(_) => self.remove(&self.templates, id),
            None => Ok(false),
        }
    }

    async fn list_templates(
        &self,
        target_type: Option<EntityType>,
        enabled_only: bool,
    ) -> Result<Vec<Template>> {
        let mut all = self.scan_all::<Template>(&self.templates)?;
        all.retain(|t| {
            target_type.is_none_or(|ty| t.target_entity_type == ty) && (!enabled_only || t.is_enabled)
        });
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    // ---- Dependencies ----

    async fn add_dependency(&self, new: NewDependency) -> Outcome<Dependency> {
        if new.from == new.to {
            return Outcome::Error(
                ErrorKind::ValidationError,
                format!("a task cannot depend on itself: {}", new.from),
            );
        }
        let _guard = self.mutation_lock.lock().await;
        let existing = match self.all_dependencies() {
            Ok(e) => e,
            Err(e) => return Outcome::Error(e.kind(), e.to_string()),
        };
        if existing
            .iter()
            .any(|d| d.from == new.from && d.to == new.to && d.dep_type == new.dep_type)
        {
            return Outcome::Error(
                ErrorKind::ConflictError,
                format!("dependency already exists: {} -> {}", new.from, new.to),
            );
        }
        if new.dep_type == DependencyType::Blocks {
            if let Some(path) = graph::detect_cycle(new.from, new.to, &existing) {
                let rendered = path.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> ");
                return Outcome::Error(
                    ErrorKind::ConflictError,
                    format!("adding {} -> {} would create a cycle: {rendered}", new.from, new.to),
                );
            }
        }
        let dependency = Dependency {
            id: EntityId::new(),
            from: new.from,
            to: new.to,
            dep_type: new.dep_type,
        };
        if let Err(e) = self.put(&self.dependencies, dependency.id, &dependency) {
            return Outcome::Error(e.kind(), e.to_string());
        }
        Outcome::Success(dependency)
    }

    async fn remove_dependency_by_id(&self, id: EntityId) -> Result<bool> {
        self.remove(&self.dependencies, id)
    }

    async fn remove_dependency(
        &self,
        from: EntityId,
        to: EntityId,
        dep_type: DependencyType,
    ) -> Result<bool> {
        let _guard = self.mutation_lock.lock().await;
        let matching: Option<EntityId> = self
            .all_dependencies()?
            .into_iter()
            .find(|d| d.from == from && d.to == to && d.dep_type == dep_type)
            .map(|d| d.id);
        match matching {
            Some(id) => self.remove(&self.dependencies, id),
            None => Ok(false),
        }
    }

    async fn incoming(&self, task_id: EntityId) -> Result<Vec<Dependency>> {
        let mut all = self.all_dependencies()?;
        all.retain(|d| d.to == task_id);
        Ok(all)
    }

    async fn outgoing(&self, task_id: EntityId) -> Result<Vec<Dependency>> {
        let mut all = self.all_dependencies()?;
        all.retain(|d| d.from == task_id);
        Ok(all)
    }

    async fn related(&self, task_id: EntityId) -> Result<Vec<Dependency>> {
        let mut all = self.all_dependencies()?;
        all.retain(|d| {
            d.dep_type == DependencyType::RelatesTo && (d.from == task_id || d.to == task_id)
        });
        Ok(all)
    }

    async fn blockers(
        &self,
        task_id: EntityId,
        is_terminal: &IsTerminal,
    ) -> Result<Vec<BlockerInfo>> {
        let prerequisites: Vec<EntityId> = self
            .all_dependencies()?
            .into_iter()
            .filter(|d| d.to == task_id && d.dep_type == DependencyType::Blocks)
            .map(|d| d.from)
            .collect();
        let mut blockers = Vec::new();
        for id in prerequisites {
            if let Some(task) = self.get_task_row(id)? {
                if !is_terminal(&task.status) {
                    blockers.push(BlockerInfo {
                        task_id: task.id,
                        title: task.title,
                        status: task.status,
                    });
                }
            }
        }
        Ok(blockers)
    }

    async fn batches(
        &self,
        scope: BatchScope,
        is_terminal: &IsTerminal,
    ) -> Result<Vec<Vec<EntityId>>> {
        let tasks: Vec<Task> = match scope {
            BatchScope::Feature(feature_id) => self
                .scan_all::<Task>(&self.tasks)?
                .into_iter()
                .filter(|t| t.feature_id == Some(feature_id))
                .collect(),
            BatchScope::Project(project_id) => self
                .scan_all::<Task>(&self.tasks)?
                .into_iter()
                .filter(|t| t.project_id == Some(project_id))
                .collect(),
        };
        let task_ids: std::collections::HashSet<EntityId> = tasks.iter().map(|t| t.id).collect();
        let blocks_edges: Vec<Dependency> = self
            .all_dependencies()?
            .into_iter()
            .filter(|d| {
                d.dep_type == DependencyType::Blocks
                    && task_ids.contains(&d.from)
                    && task_ids.contains(&d.to)
            })
            .collect();
        Ok(graph::compute_batches(&tasks, &blocks_edges, is_terminal))
    }

    // ---- Tags ----

    async fn list_tags(&self, sort: TagSortOrder) -> Result<Vec<TagUsage>> {
        let mut usage: std::collections::HashMap<String, TagUsage> = std::collections::HashMap::new();
        for p in self.scan_all::<Project>(&self.projects)? {
            accumulate_tags(&mut usage, &p.tags, EntityType::Project);
        }
        for f in self.scan_all::<Feature>(&self.features)? {
            accumulate_tags(&mut usage, &f.tags, EntityType::Feature);
        }
        for t in self.scan_all::<Task>(&self.tasks)? {
            accumulate_tags(&mut usage, &t.tags, EntityType::Task);
        }
        let mut result: Vec<TagUsage> = usage.into_values().collect();
        match sort {
            TagSortOrder::Count => result.sort_by(|a, b| b.count.cmp(&a.count).then(a.tag.cmp(&b.tag))),
            TagSortOrder::Alpha => {
                result.sort_by(|a, b| a.tag.to_lowercase().cmp(&b.tag.to_lowercase()))
            }
        }
        Ok(result)
    }

    async fn tag_usage(&self, tag: &str) -> Result<TagUsage> {
        let all = self.list_tags(TagSortOrder::Alpha).await?;
        Ok(all
            .into_iter()
            .find(|u| u.tag.eq_ignore_ascii_case(tag))
            .unwrap_or_else(|| TagUsage {
                tag: tag.to_string(),
                count: 0,
                by_entity_type: Vec::new(),
            }))
    }

    async fn rename_tag(&self, from: &str, to: &str) -> Outcome<usize> {
        let _guard = self.mutation_lock.lock().await;
        let mut changed = 0usize;

        let mut projects = match self.scan_all::<Project>(&self.projects) {
            Ok(p) => p,
            Err(e) => return Outcome::Error(e.kind(), e.to_string()),
        };
        for p in &mut projects {
            if p.tags.rename(from, to) {
                changed += 1;
                if let Err(e) = self.put(&self.projects, p.id, p) {
                    return Outcome::Error(e.kind(), e.to_string());
                }
            }
        }

        let mut features = match self.scan_all::<Feature>(&self.features) {
            Ok(f) => f,
            Err(e) => return Outcome::Error(e.kind(), e.to_string()),
        };
        for f in &mut features {
            if f.tags.rename(from, to) {
                changed += 1;
                if let Err(e) = self.put(&self.features, f.id, f) {
                    return Outcome::Error(e.kind(), e.to_string());
                }
            }
        }

        let mut tasks = match self.scan_all::<Task>(&self.tasks) {
            Ok(t) => t,
            Err(e) => return Outcome::Error(e.kind(), e.to_string()),
        };
        for t in &mut tasks {
            if t.tags.rename(from, to) {
                changed += 1;
                if let Err(e) = self.put(&self.tasks, t.id, t) {
                    return Outcome::Error(e.kind(), e.to_string());
                }
            }
        }

        Outcome::Success(changed)
    }
}

fn accumulate_tags(
    usage: &mut std::collections::HashMap<String, TagUsage>,
    tags: &Tags,
    entity_type: EntityType,
) {
    for tag in tags.iter() {
        let key = tag.to_lowercase();
        let entry = usage.entry(key).or_insert_with(|| TagUsage {
            tag: tag.to_string(),
            count: 0,
            by_entity_type: Vec::new(),
        });
        entry.count += 1;
        match entry.by_entity_type.iter_mut().find(|(ty, _)| *ty == entity_type) {
            Some((_, count)) => *count += 1,
            None => entry.by_entity_type.push((entity_type, 1)),
        }
    }
}

fn section_prototype_from_new(new: NewSectionPrototype) -> crate::domain::SectionPrototype {
    crate::domain::SectionPrototype {
        title: new.title,
        usage_description: new.usage_description,
        content: new.content,
        content_format: new.content_format,
        tags: new.tags,
    }
}

fn builtin_templates() -> Vec<Template> {
    vec![
        Template {
            id: EntityId::new(),
            name: "Bug Report".to_string(),
            description: "Standard sections for a task tracking a reported defect.".to_string(),
            target_entity_type: EntityType::Task,
            is_enabled: true,
            is_builtin: true,
            sections: vec![
                crate::domain::SectionPrototype {
                    title: "Reproduction Steps".to_string(),
                    usage_description: "Numbered steps to reproduce the defect.".to_string(),
                    content: String::new(),
                    content_format: ContentFormat::Markdown,
                    tags: vec!["bug".to_string()],
                },
                crate::domain::SectionPrototype {
                    title: "Expected vs Actual".to_string(),
                    usage_description: "What should have happened, and what happened instead.".to_string(),
                    content: String::new(),
                    content_format: ContentFormat::Markdown,
                    tags: vec!["bug".to_string()],
                },
            ],
        },
        Template {
            id: EntityId::new(),
            name: "Feature Specification".to_string(),
            description: "Standard sections for a feature entering design.".to_string(),
            target_entity_type: EntityType::Feature,
            is_enabled: true,
            is_builtin: true,
            sections: vec![crate::domain::SectionPrototype {
                title: "Acceptance Criteria".to_string(),
                usage_description: "Conditions that must hold for this feature to be considered done."
                    .to_string(),
                content: String::new(),
                content_format: ContentFormat::Markdown,
                tags: vec![],
            }],
        },
        Template {
            id: EntityId::new(),
            name: "Project Charter".to_string(),
            description: "Standard sections for a newly kicked-off project.".to_string(),
            target_entity_type: EntityType::Project,
            is_enabled: true,
            is_builtin: true,
            sections: vec![crate::domain::SectionPrototype {
                title: "Goals".to_string(),
                usage_description: "What this project is trying to accomplish.".to_string(),
                content: String::new(),
                content_format: ContentFormat::Markdown,
                tags: vec![],
            }],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewDependency, NewProject};
    use tempfile::TempDir;

    fn open_store() -> (TempDir, SledStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = SledStore::open(dir.path().join("db")).expect("open store");
        (dir, store)
    }

    #[tokio::test]
    async fn create_and_get_project_round_trips() {
        let (_dir, store) = open_store();
        let outcome = store
            .create_project(
                NewProject {
                    name: "Atlas".to_string(),
                    summary: "A project".to_string(),
                    ..Default::default()
                },
                Status::new("planning"),
            )
            .await;
        let project = match outcome {
            Outcome::Success(p) => p,
            Outcome::Error(_, msg) => panic!("unexpected error: {msg}"),
        };
        let fetched = store.get_project(project.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Atlas");
    }

    #[tokio::test]
    async fn create_project_rejects_empty_name() {
        let (_dir, store) = open_store();
        let outcome = store
            .create_project(NewProject::default(), Status::new("planning"))
            .await;
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn delete_project_cascades_to_features_and_tasks() {
        let (_dir, store) = open_store();
        let project = match store
            .create_project(
                NewProject {
                    name: "Atlas".to_string(),
                    summary: "s".to_string(),
                    ..Default::default()
                },
                Status::new("planning"),
            )
            .await
        {
            Outcome::Success(p) => p,
            Outcome::Error(_, msg) => panic!("{msg}"),
        };
        let feature = match store
            .create_feature(
                NewFeature {
                    name: "Auth".to_string(),
                    summary: "s".to_string(),
                    project_id: Some(project.id),
                    ..Default::default()
                },
                Status::new("open"),
            )
            .await
        {
            Outcome::Success(f) => f,
            Outcome::Error(_, msg) => panic!("{msg}"),
        };
        let task = match store
            .create_task(
                NewTask {
                    title: "Implement login".to_string(),
                    summary: "s".to_string(),
                    feature_id: Some(feature.id),
                    ..Default::default()
                },
                Status::new("open"),
            )
            .await
        {
            Outcome::Success(t) => t,
            Outcome::Error(_, msg) => panic!("{msg}"),
        };

        assert!(store.delete_project(project.id).await.unwrap());
        assert!(store.get_feature(feature.id).await.unwrap().is_none());
        assert!(store.get_task(task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn task_inherits_project_from_feature_when_unset() {
        let (_dir, store) = open_store();
        let project = match store
            .create_project(
                NewProject {
                    name: "Atlas".to_string(),
                    summary: "s".to_string(),
                    ..Default::default()
                },
                Status::new("planning"),
            )
            .await
        {
            Outcome::Success(p) => p,
            Outcome::Error(_, msg) => panic!("{msg}"),
        };
        let feature = match store
            .create_feature(
                NewFeature {
                    name: "Auth".to_string(),
                    summary: "s".to_string(),
                    project_id: Some(project.id),
                    ..Default::default()
                },
                Status::new("open"),
            )
            .await
        {
            Outcome::Success(f) => f,
            Outcome::Error(_, msg) => panic!("{msg}"),
        };
        let task = match store
            .create_task(
                NewTask {
                    title: "Implement login".to_string(),
                    summary: "s".to_string(),
                    feature_id: Some(feature.id),
                    ..Default::default()
                },
                Status::new("open"),
            )
            .await
        {
            Outcome::Success(t) => t,
            Outcome::Error(_, msg) => panic!("{msg}"),
        };
        assert_eq!(task.project_id, Some(project.id));
    }

    #[tokio::test]
    async fn add_dependency_rejects_self_loop() {
        let (_dir, store) = open_store();
        let task = match store
            .create_task(
                NewTask {
                    title: "T".to_string(),
                    summary: "s".to_string(),
                    ..Default::default()
                },
                Status::new("open"),
            )
            .await
        {
            Outcome::Success(t) => t,
            Outcome::Error(_, msg) => panic!("{msg}"),
        };
        let outcome = store
            .add_dependency(NewDependency {
                from: task.id,
                to: task.id,
                dep_type: DependencyType::Blocks,
            })
            .await;
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn add_dependency_rejects_cycle() {
        let (_dir, store) = open_store();
        let make_task = || async {
            match store
                .create_task(
                    NewTask {
                        title: "T".to_string(),
                        summary: "s".to_string(),
                        ..Default::default()
                    },
                    Status::new("open"),
                )
                .await
            {
                Outcome::Success(t) => t,
                Outcome::Error(_, msg) => panic!("{msg}"),
            }
        };
        let a = make_task().await;
        let b = make_task().await;

        let first = store
            .add_dependency(NewDependency {
                from: a.id,
                to: b.id,
                dep_type: DependencyType::Blocks,
            })
            .await;
        assert!(first.is_success());

        let second = store
            .add_dependency(NewDependency {
                from: b.id,
                to: a.id,
                dep_type: DependencyType::Blocks,
            })
            .await;
        assert!(!second.is_success());
    }

    #[tokio::test]
    async fn rename_tag_relabels_across_entity_kinds() {
        let (_dir, store) = open_store();
        match store
            .create_project(
                NewProject {
                    name: "Atlas".to_string(),
                    summary: "s".to_string(),
                    tags: vec!["bug".to_string()],
                    ..Default::default()
                },
                Status::new("planning"),
            )
            .await
        {
            Outcome::Success(_) => {}
            Outcome::Error(_, msg) => panic!("{msg}"),
        };
        match store
            .create_task(
                NewTask {
                    title: "T".to_string(),
                    summary: "s".to_string(),
                    tags: vec!["Bug".to_string()],
                    ..Default::default()
                },
                Status::new("open"),
            )
            .await
        {
            Outcome::Success(_) => {}
            Outcome::Error(_, msg) => panic!("{msg}"),
        };

        let outcome = store.rename_tag("bug", "defect").await;
        match outcome {
            Outcome::Success(count) => assert_eq!(count, 2),
            Outcome::Error(_, msg) => panic!("{msg}"),
        }

        let tags = store.list_tags(TagSortOrder::Alpha).await.unwrap();
        assert!(tags.iter().any(|t| t.tag.eq_ignore_ascii_case("defect")));
        assert!(!tags.iter().any(|t| t.tag.eq_ignore_ascii_case("bug")));
    }

    #[tokio::test]
    async fn builtin_templates_are_seeded_and_protected() {
        let (_dir, store) = open_store();
        let templates = store.list_templates(None, false).await.unwrap();
        assert!(templates.len() >= 3);
        let bug_template = templates.iter().find(|t| t.name == "Bug Report").unwrap();
        assert!(bug_template.is_builtin);
        let deleted = store.delete_template(bug_template.id).await;
        assert!(deleted.is_err());
    }
}
