//! Business logic behind each MCP tool.
//!
//! Kept separate from `server.rs`'s `#[tool_router]` wiring so the dispatch
//! surface and the domain logic it calls can be read (and tested)
//! independently. Every public method here returns a [`ToolResponse`]
//! envelope on the `Ok` path; a dispatch-layer [`Error`] is reserved for
//! malformed tool arguments (bad id strings, unknown enum values), which the
//! MCP layer turns into `invalid_params` rather than a `success: false`
//! envelope.

use crate::context::AppContext;
use crate::error::{Error, Result};
use crate::models::*;
use keelson::domain::{
    ContentFormat, DependencyType, EntityType, NewDependency, NewFeature, NewProject, NewSection,
    NewSectionPrototype, NewTask, NewTemplate, Priority, ProjectFilter, SectionFilter, Status,
    Tags,
};
use keelson::error::ErrorKind;
use keelson::export::ExportJob;
use keelson::id::EntityId;
use keelson::store::{BatchScope, EntityStore, Outcome, PriorityFilter, StatusFilter};
use keelson::templates::ApplyMode;
use keelson::workflow::engine::PrerequisiteContext;
use std::sync::Arc;

/// Holds the app-wide context and implements every tool's business logic.
pub struct Tools {
    ctx: Arc<AppContext>,
}

impl Tools {
    /// Build the tool surface over a shared [`AppContext`].
    #[must_use]
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    // ---- manage_container / query_container ----

    /// `manage_container`: create, update, or delete a project/feature/task.
    pub async fn manage_container(&self, p: ManageContainerParams) -> Result<ToolResponse> {
        match p.operation {
            ContainerOperation::Create => self.create_container(p).await,
            ContainerOperation::Update => self.update_container(p).await,
            ContainerOperation::Delete => self.delete_container(p).await,
        }
    }

    async fn create_container(&self, p: ManageContainerParams) -> Result<ToolResponse> {
        let name = require(&p.name, "name")?.to_string();
        let summary = p.summary.clone().unwrap_or_default();
        let tag_list = p.tags.clone().unwrap_or_default();
        let tags_set = Tags::from_iter_dedup(tag_list.clone());
        let entity_type: EntityType = p.entity_type.into();
        let template_ids = parse_id_list("template_ids", p.template_ids.as_deref())?;
        let status = self.ctx.workflow.initial_status(entity_type, &tags_set).await;

        match p.entity_type {
            ContainerKind::Project => {
                let new = NewProject {
                    name,
                    summary,
                    description: p.description.clone(),
                    tags: tag_list,
                    template_ids,
                };
                if let Err(msg) = new.validate() {
                    return Ok(error_response(ErrorKind::ValidationError, msg));
                }
                match self.ctx.store.create_project(new, status).await {
                    Outcome::Success(project) => {
                        self.ctx
                            .export_queue
                            .enqueue(ExportJob::ExportEntity(EntityType::Project, project.id));
                        Ok(ToolResponse::ok("project created", project))
                    }
                    Outcome::Error(kind, msg) => Ok(error_response(kind, msg)),
                }
            }
            ContainerKind::Feature => {
                let project_id = parse_opt_id("project_id", p.project_id.as_deref())?;
                let new = NewFeature {
                    name,
                    summary,
                    description: p.description.clone(),
                    priority: parse_priority_opt(p.priority.as_deref())?.unwrap_or_default(),
                    project_id,
                    tags: tag_list,
                    template_ids,
                };
                if let Err(msg) = new.validate() {
                    return Ok(error_response(ErrorKind::ValidationError, msg));
                }
                match self.ctx.store.create_feature(new, status).await {
                    Outcome::Success(feature) => {
                        self.ctx
                            .export_queue
                            .enqueue(ExportJob::ExportEntity(EntityType::Feature, feature.id));
                        Ok(ToolResponse::ok("feature created", feature))
                    }
                    Outcome::Error(kind, msg) => Ok(error_response(kind, msg)),
                }
            }
            ContainerKind::Task => {
                let project_id = parse_opt_id("project_id", p.project_id.as_deref())?;
                let feature_id = parse_opt_id("feature_id", p.feature_id.as_deref())?;
                let new = NewTask {
                    title: name,
                    summary,
                    description: p.description.clone(),
                    priority: parse_priority_opt(p.priority.as_deref())?.unwrap_or_default(),
                    complexity: p.complexity.unwrap_or(5),
                    feature_id,
                    project_id,
                    tags: tag_list,
                    template_ids,
                };
                if let Err(msg) = new.validate() {
                    return Ok(error_response(ErrorKind::ValidationError, msg));
                }
                match self.ctx.store.create_task(new, status).await {
                    Outcome::Success(task) => {
                        self.ctx
                            .export_queue
                            .enqueue(ExportJob::ExportEntity(EntityType::Task, task.id));
                        Ok(ToolResponse::ok("task created", task))
                    }
                    Outcome::Error(kind, msg) => Ok(error_response(kind, msg)),
                }
            }
        }
    }

    async fn update_container(&self, p: ManageContainerParams) -> Result<ToolResponse> {
        let id = parse_id("id", require(&p.id, "id")?)?;
        let entity_type: EntityType = p.entity_type.into();

        match p.entity_type {
            ContainerKind::Project => {
                let Some(project) = self.ctx.store.get_project(id).await.map_err(Error::Core)?
                else {
                    return Ok(not_found_response("project", id));
                };
                let new_status = match &p.status {
                    Some(s) => {
                        let proposed = Status::new(s.clone());
                        if let Err(err) = self
                            .ctx
                            .workflow
                            .validate_transition(
                                entity_type,
                                &project.tags,
                                &project.status,
                                &proposed,
                                &PrerequisiteContext::None,
                            )
                            .await
                        {
                            return Ok(error_response(ErrorKind::ValidationError, err.to_string()));
                        }
                        Some(proposed)
                    }
                    None => None,
                };
                let update = keelson::domain::ProjectUpdate {
                    name: p.name.clone(),
                    summary: p.summary.clone(),
                    description: double_opt_string(&p.description),
                    status: new_status,
                    tags: p.tags.clone(),
                };
                match self.ctx.store.update_project(id, update).await {
                    Outcome::Success(project) => {
                        self.ctx
                            .export_queue
                            .enqueue(ExportJob::Cascade(EntityType::Project, project.id));
                        Ok(ToolResponse::ok("project updated", project))
                    }
                    Outcome::Error(kind, msg) => Ok(error_response(kind, msg)),
                }
            }
            ContainerKind::Feature => {
                let Some(feature) = self.ctx.store.get_feature(id).await.map_err(Error::Core)?
                else {
                    return Ok(not_found_response("feature", id));
                };
                let new_status = match &p.status {
                    Some(s) => {
                        let proposed = Status::new(s.clone());
                        let tasks = self
                            .ctx
                            .store
                            .find_all_tasks(None)
                            .await
                            .map_err(Error::Core)?;
                        let children: Vec<_> =
                            tasks.iter().filter(|t| t.feature_id == Some(id)).collect();
                        let mut all_terminal = !children.is_empty();
                        for t in &children {
                            if !self.ctx.workflow.is_terminal(EntityType::Task, &t.status).await {
                                all_terminal = false;
                                break;
                            }
                        }
                        let ctx = PrerequisiteContext::Feature {
                            has_children: !children.is_empty(),
                            all_children_terminal: all_terminal,
                        };
                        if let Err(err) = self
                            .ctx
                            .workflow
                            .validate_transition(
                                entity_type,
                                &feature.tags,
                                &feature.status,
                                &proposed,
                                &ctx,
                            )
                            .await
                        {
                            return Ok(error_response(ErrorKind::ValidationError, err.to_string()));
                        }
                        Some(proposed)
                    }
                    None => None,
                };
                let project_id = double_opt_id("project_id", &p.project_id)?;
                let update = keelson::domain::FeatureUpdate {
                    name: p.name.clone(),
                    summary: p.summary.clone(),
                    description: double_opt_string(&p.description),
                    status: new_status,
                    priority: parse_priority_opt(p.priority.as_deref())?,
                    project_id,
                    tags: p.tags.clone(),
                };
                match self.ctx.store.update_feature(id, update).await {
                    Outcome::Success(feature) => {
                        self.ctx
                            .export_queue
                            .enqueue(ExportJob::Cascade(EntityType::Feature, feature.id));
                        Ok(ToolResponse::ok("feature updated", feature))
                    }
                    Outcome::Error(kind, msg) => Ok(error_response(kind, msg)),
                }
            }
            ContainerKind::Task => {
                let Some(task) = self.ctx.store.get_task(id).await.map_err(Error::Core)? else {
                    return Ok(not_found_response("task", id));
                };
                let new_status = match &p.status {
                    Some(s) => {
                        let proposed = Status::new(s.clone());
                        let terminals =
                            self.ctx.workflow.terminal_statuses(EntityType::Task).await;
                        let is_terminal = move |s: &Status| terminals.contains(s);
                        let blockers = self
                            .ctx
                            .store
                            .blockers(id, &is_terminal)
                            .await
                            .map_err(Error::Core)?;
                        let ctx = PrerequisiteContext::Task {
                            summary_ok: task.summary_satisfies_completion_gate(),
                            blockers: blockers
                                .iter()
                                .map(|b| format!("{} ({})", b.title, b.status))
                                .collect(),
                        };
                        if let Err(err) = self
                            .ctx
                            .workflow
                            .validate_transition(
                                entity_type,
                                &task.tags,
                                &task.status,
                                &proposed,
                                &ctx,
                            )
                            .await
                        {
                            return Ok(error_response(ErrorKind::ValidationError, err.to_string()));
                        }
                        Some(proposed)
                    }
                    None => None,
                };
                let project_id = double_opt_id("project_id", &p.project_id)?;
                let feature_id = double_opt_id("feature_id", &p.feature_id)?;
                let update = keelson::domain::TaskUpdate {
                    title: p.name.clone(),
                    summary: p.summary.clone(),
                    description: double_opt_string(&p.description),
                    status: new_status,
                    priority: parse_priority_opt(p.priority.as_deref())?,
                    complexity: p.complexity,
                    feature_id,
                    project_id,
                    tags: p.tags.clone(),
                };
                match self.ctx.store.update_task(id, update).await {
                    Outcome::Success(task) => {
                        self.ctx
                            .export_queue
                            .enqueue(ExportJob::ExportEntity(EntityType::Task, task.id));
                        Ok(ToolResponse::ok("task updated", task))
                    }
                    Outcome::Error(kind, msg) => Ok(error_response(kind, msg)),
                }
            }
        }
    }

    async fn delete_container(&self, p: ManageContainerParams) -> Result<ToolResponse> {
        let id = parse_id("id", require(&p.id, "id")?)?;
        let entity_type: EntityType = p.entity_type.into();
        let path = self.ctx.exporter.known_path(id).await;
        let deleted = match p.entity_type {
            ContainerKind::Project => self.ctx.store.delete_project(id).await,
            ContainerKind::Feature => self.ctx.store.delete_feature(id).await,
            ContainerKind::Task => self.ctx.store.delete_task(id).await,
        }
        .map_err(Error::Core)?;
        if deleted {
            if let Some(path) = path {
                self.ctx.export_queue.enqueue(ExportJob::DeleteEntity(id, path));
            }
            Ok(ToolResponse::ok_empty(format!("{entity_type:?} deleted")))
        } else {
            Ok(not_found_response("entity", id))
        }
    }

    /// `query_container`: fetch one or list with filters.
    pub async fn query_container(&self, p: QueryContainerParams) -> Result<ToolResponse> {
        match p.operation {
            ContainerQuery::Get => {
                let id = parse_id("id", require(&p.id, "id")?)?;
                match p.entity_type {
                    ContainerKind::Project => match self
                        .ctx
                        .store
                        .get_project(id)
                        .await
                        .map_err(Error::Core)?
                    {
                        Some(v) => Ok(ToolResponse::ok("project found", v)),
                        None => Ok(not_found_response("project", id)),
                    },
                    ContainerKind::Feature => match self
                        .ctx
                        .store
                        .get_feature(id)
                        .await
                        .map_err(Error::Core)?
                    {
                        Some(v) => Ok(ToolResponse::ok("feature found", v)),
                        None => Ok(not_found_response("feature", id)),
                    },
                    ContainerKind::Task => {
                        match self.ctx.store.get_task(id).await.map_err(Error::Core)? {
                            Some(v) => Ok(ToolResponse::ok("task found", v)),
                            None => Ok(not_found_response("task", id)),
                        }
                    }
                }
            }
            ContainerQuery::List => {
                let status = StatusFilter::parse(p.status.as_deref().unwrap_or(""));
                let priority = PriorityFilter::parse(p.priority.as_deref().unwrap_or(""));
                let required_tags = p.tags.clone().unwrap_or_default();
                match p.entity_type {
                    ContainerKind::Project => {
                        let filter = ProjectFilter {
                            status,
                            required_tags,
                            text_query: p.text_query.clone(),
                            limit: p.limit,
                        };
                        let results =
                            self.ctx.store.find_projects(&filter).await.map_err(Error::Core)?;
                        Ok(ToolResponse::ok(format!("{} project(s)", results.len()), results))
                    }
                    ContainerKind::Feature => {
                        let project_id = parse_opt_id("project_id", p.project_id.as_deref())?;
                        let filter = keelson::domain::FeatureFilter {
                            status,
                            priority,
                            required_tags,
                            text_query: p.text_query.clone(),
                            project_id,
                        };
                        let results =
                            self.ctx.store.find_features(&filter).await.map_err(Error::Core)?;
                        Ok(ToolResponse::ok(format!("{} feature(s)", results.len()), results))
                    }
                    ContainerKind::Task => {
                        let project_id = parse_opt_id("project_id", p.project_id.as_deref())?;
                        let feature_id = parse_opt_id("feature_id", p.feature_id.as_deref())?;
                        let filter = keelson::domain::TaskFilter {
                            status,
                            priority,
                            required_tags,
                            text_query: p.text_query.clone(),
                            project_id,
                            feature_id,
                            limit: p.limit,
                        };
                        let results =
                            self.ctx.store.find_tasks(&filter).await.map_err(Error::Core)?;
                        Ok(ToolResponse::ok(format!("{} task(s)", results.len()), results))
                    }
                }
            }
        }
    }

    // ---- manage_sections / query_sections ----

    /// `manage_sections`: add, update, delete, or reorder an entity's sections.
    pub async fn manage_sections(&self, p: ManageSectionsParams) -> Result<ToolResponse> {
        let entity_id = parse_id("entity_id", &p.entity_id)?;
        let entity_type: EntityType = p.entity_type.into();
        match p.operation {
            SectionOperation::Add => {
                let title = require(&p.title, "title")?.to_string();
                let new = NewSection {
                    entity_type,
                    entity_id,
                    title,
                    usage_description: p.usage_description.clone().unwrap_or_default(),
                    content: p.content.clone().unwrap_or_default(),
                    content_format: parse_content_format(p.content_format.as_deref())?,
                    ordinal: None,
                    tags: p.tags.clone().unwrap_or_default(),
                };
                if let Err(msg) = new.validate() {
                    return Ok(error_response(ErrorKind::ValidationError, msg));
                }
                match self.ctx.store.add_section(new).await {
                    Outcome::Success(section) => {
                        self.ctx
                            .export_queue
                            .enqueue(ExportJob::ExportEntity(entity_type, entity_id));
                        Ok(ToolResponse::ok("section added", section))
                    }
                    Outcome::Error(kind, msg) => Ok(error_response(kind, msg)),
                }
            }
            SectionOperation::Update => {
                let section_id = parse_id("section_id", require(&p.section_id, "section_id")?)?;
                let update = keelson::domain::SectionUpdate {
                    title: p.title.clone(),
                    usage_description: p.usage_description.clone(),
                    content: p.content.clone(),
                    content_format: match &p.content_format {
                        Some(s) => Some(parse_content_format(Some(s))?),
                        None => None,
                    },
                    tags: p.tags.clone(),
                };
                match self.ctx.store.update_section(section_id, update).await {
                    Outcome::Success(section) => {
                        self.ctx
                            .export_queue
                            .enqueue(ExportJob::ExportEntity(entity_type, entity_id));
                        Ok(ToolResponse::ok("section updated", section))
                    }
                    Outcome::Error(kind, msg) => Ok(error_response(kind, msg)),
                }
            }
            SectionOperation::Delete => {
                let section_id = parse_id("section_id", require(&p.section_id, "section_id")?)?;
                let deleted =
                    self.ctx.store.delete_section(section_id).await.map_err(Error::Core)?;
                if deleted {
                    self.ctx
                        .export_queue
                        .enqueue(ExportJob::ExportEntity(entity_type, entity_id));
                    Ok(ToolResponse::ok_empty("section deleted"))
                } else {
                    Ok(not_found_response("section", section_id))
                }
            }
            SectionOperation::Reorder => {
                let ordered = parse_id_list(
                    "ordered_ids",
                    Some(p.ordered_ids.clone().unwrap_or_default().as_slice()),
                )?;
                match self
                    .ctx
                    .store
                    .reorder_sections(entity_type, entity_id, ordered)
                    .await
                {
                    Outcome::Success(sections) => {
                        self.ctx
                            .export_queue
                            .enqueue(ExportJob::ExportEntity(entity_type, entity_id));
                        Ok(ToolResponse::ok("sections reordered", sections))
                    }
                    Outcome::Error(kind, msg) => Ok(error_response(kind, msg)),
                }
            }
        }
    }

    /// `query_sections`: list an entity's sections, optionally filtered.
    pub async fn query_sections(&self, p: QuerySectionsParams) -> Result<ToolResponse> {
        let entity_id = parse_id("entity_id", &p.entity_id)?;
        let entity_type: EntityType = p.entity_type.into();
        let filter = SectionFilter {
            required_tags: p.tags.clone().unwrap_or_default(),
            text_query: p.text_query.clone(),
        };
        let sections = self
            .ctx
            .store
            .list_sections(entity_type, entity_id, &filter)
            .await
            .map_err(Error::Core)?;
        Ok(ToolResponse::ok(format!("{} section(s)", sections.len()), sections))
    }

    // ---- manage_template / query_templates / apply_template ----

    /// `manage_template`: create, enable/disable/rename, or delete a template.
    pub async fn manage_template(&self, p: ManageTemplateParams) -> Result<ToolResponse> {
        match p.operation {
            TemplateOperation::Create => {
                let name = require(&p.name, "name")?.to_string();
                let target = p.target_entity_type.ok_or(Error::InvalidArgument {
                    field: "target_entity_type",
                    value: "<missing>".to_string(),
                    valid_values: "project, feature, task",
                })?;
                let mut sections = Vec::new();
                for proto in p.sections.clone().unwrap_or_default() {
                    sections.push(NewSectionPrototype {
                        title: proto.title,
                        usage_description: proto.usage_description,
                        content: proto.content,
                        content_format: parse_content_format(proto.content_format.as_deref())?,
                        tags: proto.tags.unwrap_or_default(),
                    });
                }
                let new = NewTemplate {
                    name,
                    description: p.description.clone().unwrap_or_default(),
                    target_entity_type: Some(target.into()),
                    sections,
                };
                if let Err(msg) = new.validate() {
                    return Ok(error_response(ErrorKind::ValidationError, msg));
                }
                match self.ctx.store.create_template(new).await {
                    Outcome::Success(template) => {
                        Ok(ToolResponse::ok("template created", template))
                    }
                    Outcome::Error(kind, msg) => Ok(error_response(kind, msg)),
                }
            }
            TemplateOperation::Update => {
                let id = parse_id("id", require(&p.id, "id")?)?;
                match self
                    .ctx
                    .store
                    .update_template(id, p.name.clone(), p.description.clone(), p.is_enabled)
                    .await
                {
                    Outcome::Success(template) => {
                        Ok(ToolResponse::ok("template updated", template))
                    }
                    Outcome::Error(kind, msg) => Ok(error_response(kind, msg)),
                }
            }
            TemplateOperation::Delete => {
                let id = parse_id("id", require(&p.id, "id")?)?;
                let deleted = self.ctx.store.delete_template(id).await.map_err(Error::Core)?;
                if deleted {
                    Ok(ToolResponse::ok_empty("template deleted"))
                } else {
                    Ok(not_found_response("template", id))
                }
            }
        }
    }

    /// `query_templates`: list templates, optionally by target entity type.
    pub async fn query_templates(&self, p: QueryTemplatesParams) -> Result<ToolResponse> {
        let target = p.target_entity_type.map(keelson::domain::EntityType::from);
        let templates = self
            .ctx
            .store
            .list_templates(target, !p.include_disabled.unwrap_or(false))
            .await
            .map_err(Error::Core)?;
        Ok(ToolResponse::ok(format!("{} template(s)", templates.len()), templates))
    }

    /// `apply_template`: materialize one or more templates onto a target entity.
    pub async fn apply_template(&self, p: ApplyTemplateParams) -> Result<ToolResponse> {
        let template_ids = parse_id_list("template_ids", Some(p.template_ids.as_slice()))?;
        let entity_id = parse_id("entity_id", &p.entity_id)?;
        let entity_type: EntityType = p.entity_type.into();
        let mode = match p.mode.as_deref() {
            None | Some("skip_duplicate") => ApplyMode::SkipDuplicate,
            Some("overwrite") => ApplyMode::Overwrite,
            Some("error") => ApplyMode::Error,
            Some(other) => {
                return Err(Error::InvalidArgument {
                    field: "mode",
                    value: other.to_string(),
                    valid_values: "skip_duplicate, overwrite, error",
                })
            }
        };
        match keelson::templates::apply(
            self.ctx.store.as_ref(),
            &template_ids,
            entity_type,
            entity_id,
            mode,
        )
        .await
        {
            Ok(sections) => {
                self.ctx
                    .export_queue
                    .enqueue(ExportJob::ExportEntity(entity_type, entity_id));
                Ok(ToolResponse::ok(format!("{} section(s) applied", sections.len()), sections))
            }
            Err(err) => Ok(error_response(err.kind(), err.to_string())),
        }
    }

    // ---- manage_dependency / query_dependencies ----

    /// `manage_dependency`: add or remove a dependency edge between two tasks.
    pub async fn manage_dependency(&self, p: ManageDependencyParams) -> Result<ToolResponse> {
        let from = parse_id("from_task_id", &p.from_task_id)?;
        let to = parse_id("to_task_id", &p.to_task_id)?;
        let dep_type = parse_dependency_type(require(&p.dependency_type, "dependency_type")?)?;
        match p.operation {
            DependencyOperation::Add => {
                let new = NewDependency { from, to, dep_type };
                match self.ctx.store.add_dependency(new).await {
                    Outcome::Success(dep) => Ok(ToolResponse::ok("dependency added", dep)),
                    Outcome::Error(kind, msg) => Ok(error_response(kind, msg)),
                }
            }
            DependencyOperation::Remove => {
                let removed = self
                    .ctx
                    .store
                    .remove_dependency(from, to, dep_type)
                    .await
                    .map_err(Error::Core)?;
                if removed {
                    Ok(ToolResponse::ok_empty("dependency removed"))
                } else {
                    Ok(error_response(
                        ErrorKind::NotFound,
                        format!("dependency {from} -> {to} not found"),
                    ))
                }
            }
        }
    }

    /// `query_dependencies`: incoming/outgoing edges, unresolved blockers, or
    /// topological execution batches.
    pub async fn query_dependencies(&self, p: QueryDependenciesParams) -> Result<ToolResponse> {
        match p.operation {
            DependencyQuery::Incoming => {
                let task_id = parse_id("task_id", require(&p.task_id, "task_id")?)?;
                let edges = self.ctx.store.incoming(task_id).await.map_err(Error::Core)?;
                Ok(ToolResponse::ok(format!("{} incoming edge(s)", edges.len()), edges))
            }
            DependencyQuery::Outgoing => {
                let task_id = parse_id("task_id", require(&p.task_id, "task_id")?)?;
                let edges = self.ctx.store.outgoing(task_id).await.map_err(Error::Core)?;
                Ok(ToolResponse::ok(format!("{} outgoing edge(s)", edges.len()), edges))
            }
            DependencyQuery::Blockers => {
                let task_id = parse_id("task_id", require(&p.task_id, "task_id")?)?;
                let terminals = self.ctx.workflow.terminal_statuses(EntityType::Task).await;
                let is_terminal = move |s: &Status| terminals.contains(s);
                let blockers = self
                    .ctx
                    .store
                    .blockers(task_id, &is_terminal)
                    .await
                    .map_err(Error::Core)?;
                let payload: Vec<_> = blockers
                    .iter()
                    .map(|b| {
                        serde_json::json!({
                            "task_id": b.task_id,
                            "title": b.title,
                            "status": b.status,
                        })
                    })
                    .collect();
                Ok(ToolResponse::ok(format!("{} unresolved blocker(s)", payload.len()), payload))
            }
            DependencyQuery::Batches => {
                let scope = match (&p.project_id, &p.feature_id) {
                    (Some(raw), _) => BatchScope::Project(parse_id("project_id", raw)?),
                    (None, Some(raw)) => BatchScope::Feature(parse_id("feature_id", raw)?),
                    (None, None) => {
                        return Err(Error::InvalidArgument {
                            field: "project_id/feature_id",
                            value: "<missing>".to_string(),
                            valid_values: "one of project_id, feature_id must be set",
                        })
                    }
                };
                let terminals = self.ctx.workflow.terminal_statuses(EntityType::Task).await;
                let is_terminal = move |s: &Status| terminals.contains(s);
                let batches =
                    self.ctx.store.batches(scope, &is_terminal).await.map_err(Error::Core)?;
                Ok(ToolResponse::ok(format!("{} batch(es)", batches.len()), batches))
            }
        }
    }

    // ---- tags ----

    /// `list_tags`: every tag in use, with counts, sorted as requested.
    pub async fn list_tags(&self, p: ListTagsParams) -> Result<ToolResponse> {
        let sort = match p.sort.as_deref() {
            None | Some("count") => keelson::domain::TagSortOrder::Count,
            Some("alpha") => keelson::domain::TagSortOrder::Alpha,
            Some(other) => {
                return Err(Error::InvalidArgument {
                    field: "sort",
                    value: other.to_string(),
                    valid_values: "count, alpha",
                })
            }
        };
        let tags = self.ctx.store.list_tags(sort).await.map_err(Error::Core)?;
        Ok(ToolResponse::ok(format!("{} tag(s)", tags.len()), tags))
    }

    /// `rename_tag`: atomically relabel a tag across every entity.
    pub async fn rename_tag(&self, p: RenameTagParams) -> Result<ToolResponse> {
        match self.ctx.store.rename_tag(&p.from, &p.to).await {
            Outcome::Success(count) => {
                Ok(ToolResponse::ok(format!("{count} entit(y/ies) updated"), count))
            }
            Outcome::Error(kind, msg) => Ok(error_response(kind, msg)),
        }
    }

    /// `get_tag_usage`: usage report for a single tag.
    pub async fn get_tag_usage(&self, p: GetTagUsageParams) -> Result<ToolResponse> {
        let usage = self.ctx.store.tag_usage(&p.tag).await.map_err(Error::Core)?;
        Ok(ToolResponse::ok("tag usage", usage))
    }

    // ---- workflow ----

    /// `get_next_status`: the workflow engine's next-status recommendation
    /// for an entity in its current state.
    pub async fn get_next_status(&self, p: GetNextStatusParams) -> Result<ToolResponse> {
        let id = parse_id("entity_id", &p.entity_id)?;
        let entity_type: EntityType = p.entity_type.into();
        let (tags, status) = match p.entity_type {
            ContainerKind::Project => {
                let Some(v) = self.ctx.store.get_project(id).await.map_err(Error::Core)? else {
                    return Ok(not_found_response("project", id));
                };
                (v.tags, v.status)
            }
            ContainerKind::Feature => {
                let Some(v) = self.ctx.store.get_feature(id).await.map_err(Error::Core)? else {
                    return Ok(not_found_response("feature", id));
                };
                (v.tags, v.status)
            }
            ContainerKind::Task => {
                let Some(v) = self.ctx.store.get_task(id).await.map_err(Error::Core)? else {
                    return Ok(not_found_response("task", id));
                };
                (v.tags, v.status)
            }
        };
        let ctx = self.prerequisite_context_for(entity_type, id).await?;
        let next = self.ctx.workflow.next_status(entity_type, &tags, &status, &ctx).await;
        Ok(ToolResponse::ok("next status computed", next))
    }

    async fn prerequisite_context_for(
        &self,
        entity_type: EntityType,
        id: EntityId,
    ) -> Result<PrerequisiteContext> {
        match entity_type {
            EntityType::Task => {
                let task = self
                    .ctx
                    .store
                    .get_task(id)
                    .await
                    .map_err(Error::Core)?
                    .ok_or_else(|| Error::Core(keelson::error::StoreError::NotFound(id).into()))?;
                let terminals = self.ctx.workflow.terminal_statuses(EntityType::Task).await;
                let is_terminal = move |s: &Status| terminals.contains(s);
                let blockers =
                    self.ctx.store.blockers(id, &is_terminal).await.map_err(Error::Core)?;
                Ok(PrerequisiteContext::Task {
                    summary_ok: task.summary_satisfies_completion_gate(),
                    blockers: blockers
                        .iter()
                        .map(|b| format!("{} ({})", b.title, b.status))
                        .collect(),
                })
            }
            EntityType::Feature => {
                let tasks = self.ctx.store.find_all_tasks(None).await.map_err(Error::Core)?;
                let children: Vec<_> = tasks.iter().filter(|t| t.feature_id == Some(id)).collect();
                let mut all_terminal = !children.is_empty();
                for t in &children {
                    if !self.ctx.workflow.is_terminal(EntityType::Task, &t.status).await {
                        all_terminal = false;
                        break;
                    }
                }
                Ok(PrerequisiteContext::Feature {
                    has_children: !children.is_empty(),
                    all_children_terminal: all_terminal,
                })
            }
            EntityType::Project | EntityType::Template => Ok(PrerequisiteContext::None),
        }
    }

    // ---- vault export ----

    /// `rebuild_vault`: re-enqueue every entity for export, rebuilding the
    /// Markdown vault from scratch.
    pub async fn rebuild_vault(&self, _p: RebuildVaultParams) -> Result<ToolResponse> {
        self.ctx
            .exporter
            .full_export(&self.ctx.export_queue)
            .await
            .map_err(Error::Core)?;
        Ok(ToolResponse::ok_empty("vault rebuild enqueued"))
    }
}

// ---- parsing/response helpers ----

fn require<'a>(opt: &'a Option<String>, field: &'static str) -> Result<&'a str> {
    match opt.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::InvalidArgument {
            field,
            value: "<missing>".to_string(),
            valid_values: "a non-empty value is required",
        }),
    }
}

fn parse_id(field: &'static str, raw: &str) -> Result<EntityId> {
    EntityId::parse(raw).map_err(|_| Error::InvalidArgument {
        field,
        value: raw.to_string(),
        valid_values: "a UUID",
    })
}

fn parse_opt_id(field: &'static str, raw: Option<&str>) -> Result<Option<EntityId>> {
    match raw {
        None | Some("") => Ok(None),
        Some(v) => parse_id(field, v).map(Some),
    }
}

fn parse_id_list(field: &'static str, raw: Option<&[String]>) -> Result<Vec<EntityId>> {
    raw.unwrap_or(&[]).iter().map(|s| parse_id(field, s)).collect()
}

/// Double-`Option` conversion for a plain string param: omitted -> leave
/// unchanged, empty string -> clear, non-empty -> set.
fn double_opt_string(raw: &Option<String>) -> Option<Option<String>> {
    raw.as_ref().map(|v| if v.is_empty() { None } else { Some(v.clone()) })
}

/// Same convention as [`double_opt_string`], for an id-valued field: omitted
/// -> leave unchanged, empty string -> unassign/orphan, non-empty -> parse
/// and reassign.
fn double_opt_id(field: &'static str, raw: &Option<String>) -> Result<Option<Option<EntityId>>> {
    match raw {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(Some(None)),
        Some(v) => Ok(Some(Some(parse_id(field, v)?))),
    }
}

fn parse_priority_opt(raw: Option<&str>) -> Result<Option<Priority>> {
    match raw {
        None => Ok(None),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "high" => Ok(Some(Priority::High)),
            "medium" => Ok(Some(Priority::Medium)),
            "low" => Ok(Some(Priority::Low)),
            other => Err(Error::InvalidArgument {
                field: "priority",
                value: other.to_string(),
                valid_values: "high, medium, low",
            }),
        },
    }
}

fn parse_content_format(raw: Option<&str>) -> Result<ContentFormat> {
    match raw.unwrap_or("markdown") {
        "markdown" => Ok(ContentFormat::Markdown),
        "plain_text" => Ok(ContentFormat::PlainText),
        "json" => Ok(ContentFormat::Json),
        "code" => Ok(ContentFormat::Code),
        other => Err(Error::InvalidArgument {
            field: "content_format",
            value: other.to_string(),
            valid_values: "markdown, plain_text, json, code",
        }),
    }
}

fn parse_dependency_type(raw: &str) -> Result<DependencyType> {
    match raw {
        "blocks" => Ok(DependencyType::Blocks),
        "relates_to" => Ok(DependencyType::RelatesTo),
        "is_blocked_by" => Ok(DependencyType::IsBlockedBy),
        other => Err(Error::InvalidArgument {
            field: "dependency_type",
            value: other.to_string(),
            valid_values: "blocks, relates_to, is_blocked_by",
        }),
    }
}

fn error_response(kind: ErrorKind, message: String) -> ToolResponse {
    ToolResponse {
        success: false,
        message: message.clone(),
        data: None,
        error: Some(ToolError { code: kind_code(kind).to_string(), message }),
    }
}

fn not_found_response(what: &str, id: EntityId) -> ToolResponse {
    error_response(ErrorKind::NotFound, format!("{what} {id} not found"))
}

fn kind_code(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NotFound => "RESOURCE_NOT_FOUND",
        ErrorKind::ValidationError => "VALIDATION_ERROR",
        ErrorKind::ConflictError => "DUPLICATE_RESOURCE",
        ErrorKind::DatabaseError => "DATABASE_ERROR",
        ErrorKind::UnknownError => "UNKNOWN_ERROR",
    }
}
