//! Markdown export pipeline: a decorator over store-mutating calls that
//! enqueues export jobs onto a bounded, single-consumer-per-vault queue,
//! renders each affected entity to Markdown, resolves its hierarchical
//! vault path, detects renames/moves against the persisted sync-state
//! index, and writes the result. Export errors are logged and dropped,
//! never surfaced to the mutating caller.

pub mod path;
pub mod render;
pub mod sync_state;

use crate::domain::{EntityType, Priority, SectionFilter};
use crate::id::EntityId;
use crate::store::EntityStore;
use crate::workflow::WorkflowEngine;
use render::{RenderInput, StatusGroup, StatusTableRow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sync_state::SyncState;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, warn};

const QUEUE_CAPACITY: usize = 256;

/// One unit of export work.
#[derive(Debug, Clone)]
pub enum ExportJob {
    /// Re-render and write one entity.
    ExportEntity(EntityType, EntityId),
    /// Remove an entity's exported file, given its last known path.
    DeleteEntity(EntityId, PathBuf),
    /// Re-export an entity and every descendant that may reference it by
    /// name in its own resolved path (a project rename moves its features
    /// and tasks too).
    Cascade(EntityType, EntityId),
}

/// Producer handle for enqueuing export jobs without waiting for them to
/// run. Non-blocking: a saturated queue drops the job and logs a warning,
/// per the pipeline's "best-effort, never block the caller" contract.
#[derive(Clone)]
pub struct ExportQueue {
    sender: mpsc::Sender<ExportJob>,
}

impl ExportQueue {
    /// Enqueue `job`. Drops and logs on a saturated queue.
    pub fn enqueue(&self, job: ExportJob) {
        if let Err(err) = self.sender.try_send(job.clone()) {
            warn!(?err, ?job, "export queue saturated, dropping job");
        }
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn status_group(normalized_status: &str, is_terminal: bool) -> StatusGroup {
    if normalized_status.contains("cancel") || normalized_status.contains("defer") || normalized_status.contains("archiv") {
        StatusGroup::Other
    } else if is_terminal {
        StatusGroup::Completed
    } else {
        StatusGroup::Active
    }
}

/// Ties the store, workflow engine, and sync-state index together to
/// implement the export decorator. One instance per vault.
pub struct VaultExporter {
    store: Arc<dyn EntityStore>,
    workflow: Arc<WorkflowEngine>,
    vault_root: PathBuf,
    sync_state: Mutex<SyncState>,
    sync_state_path: PathBuf,
}

impl VaultExporter {
    /// Construct an exporter over `vault_root`, loading any existing
    /// `.sync-state.json` found there.
    pub async fn open(
        store: Arc<dyn EntityStore>,
        workflow: Arc<WorkflowEngine>,
        vault_root: impl Into<PathBuf>,
    ) -> Self {
        let vault_root = vault_root.into();
        let sync_state_path = vault_root.join(".sync-state.json");
        let now = chrono::Utc::now();
        let sync_state = SyncState::load(&sync_state_path, now).await;
        Self {
            store,
            workflow,
            vault_root,
            sync_state: Mutex::new(sync_state),
            sync_state_path,
        }
    }

    /// Spawn the queue's producer/consumer pair. The returned [`ExportQueue`]
    /// is the decorator's enqueue side; the consumer future drains jobs
    /// serially until the queue is dropped and should be spawned as its own
    /// task by the caller.
    pub fn spawn_consumer(self: Arc<Self>) -> (ExportQueue, impl std::future::Future<Output = ()>) {
        let (sender, mut receiver) = mpsc::channel(QUEUE_CAPACITY);
        let exporter = self;
        let consumer = async move {
            while let Some(job) = receiver.recv().await {
                exporter.run_job(job).await;
            }
        };
        (ExportQueue { sender }, consumer)
    }

    async fn run_job(&self, job: ExportJob) {
        match job {
            ExportJob::ExportEntity(entity_type, id) => {
                if let Err(err) = self.export_entity(entity_type, id).await {
                    error!(?entity_type, %id, %err, "export failed");
                }
            }
            ExportJob::DeleteEntity(id, known_path) => {
                if let Err(err) = self.delete_entity(id, &known_path).await {
                    error!(%id, %err, "delete-on-export failed");
                }
            }
            ExportJob::Cascade(entity_type, id) => {
                if let Err(err) = self.cascade(entity_type, id).await {
                    error!(?entity_type, %id, %err, "cascade export failed");
                }
            }
        }
    }

    /// Render and write one entity, performing rename/move detection against
    /// the sync-state index. Returns `Ok(Some(new_path))` when the entity
    /// still exists, `Ok(None)` if it has since been deleted (a no-op).
    async fn export_entity(&self, entity_type: EntityType, id: EntityId) -> crate::error::Result<Option<PathBuf>> {
        let Some(resolved) = self.assemble(entity_type, id).await? else {
            return Ok(None);
        };

        let sections = self
            .store
            .list_sections(entity_type, id, &SectionFilter::default())
            .await?;

        let status_table = match entity_type {
            EntityType::Feature => Some(self.render_feature_status_table(id).await?),
            EntityType::Project => Some(self.render_project_status_table(id).await?),
            _ => None,
        };

        let input = RenderInput {
            id,
            entity_type,
            name: &resolved.name,
            summary: &resolved.summary,
            status: &resolved.status,
            priority: resolved.priority,
            project_id: resolved.project_id,
            feature_id: resolved.feature_id,
            tags: &resolved.tags,
            created_at: resolved.created_at,
            modified_at: resolved.modified_at,
            sections: &sections,
        };
        let document = render::render_document(&input, status_table.as_deref());

        let new_path = path::resolve_path(
            &self.vault_root,
            entity_type,
            &resolved.name,
            &resolved.status,
            resolved.project_name.as_deref(),
            resolved.feature_name.as_deref(),
        );

        let mut state = self.sync_state.lock().await;
        if let Some(old_path) = state.path_for(id) {
            if old_path != new_path {
                let _ = tokio::fs::remove_file(&old_path).await;
                remove_empty_ancestors(&old_path, &self.vault_root).await;
            }
        }

        if let Some(parent) = new_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                crate::error::ExportError::Write { path: new_path.display().to_string(), source: e }
            })?;
        }
        tokio::fs::write(&new_path, document.as_bytes()).await.map_err(|e| {
            crate::error::ExportError::Write { path: new_path.display().to_string(), source: e }
        })?;

        state.record(id, entity_type, &new_path, resolved.modified_at);
        state
            .save(&self.sync_state_path, chrono::Utc::now())
            .await?;

        Ok(Some(new_path))
    }

    async fn delete_entity(&self, id: EntityId, known_path: &Path) -> crate::error::Result<()> {
        let _ = tokio::fs::remove_file(known_path).await;
        remove_empty_ancestors(known_path, &self.vault_root).await;
        let mut state = self.sync_state.lock().await;
        state.remove(id);
        state.save(&self.sync_state_path, chrono::Utc::now()).await?;
        Ok(())
    }

    /// Re-export `id` and, since a parent's resolved path names its
    /// children by name rather than id, every descendant whose path is
    /// derived from it.
    async fn cascade(&self, entity_type: EntityType, id: EntityId) -> crate::error::Result<()> {
        self.export_entity(entity_type, id).await?;
        match entity_type {
            EntityType::Project => {
                let features = self.store.find_all_features(None).await?;
                for feature in features.into_iter().filter(|f| f.project_id == Some(id)) {
                    Box::pin(self.cascade(EntityType::Feature, feature.id)).await?;
                }
                let tasks = self.store.find_all_tasks(None).await?;
                for task in tasks.into_iter().filter(|t| t.project_id == Some(id) && t.feature_id.is_none()) {
                    self.export_entity(EntityType::Task, task.id).await?;
                }
            }
            EntityType::Feature => {
                let tasks = self.store.find_all_tasks(None).await?;
                for task in tasks.into_iter().filter(|t| t.feature_id == Some(id)) {
                    self.export_entity(EntityType::Task, task.id).await?;
                }
            }
            EntityType::Task | EntityType::Template => {}
        }
        Ok(())
    }

    /// The last path this entity was exported to, if it has ever been
    /// exported, for callers that need to enqueue a [`ExportJob::DeleteEntity`]
    /// after removing the entity from the store.
    pub async fn known_path(&self, id: EntityId) -> Option<PathBuf> {
        self.sync_state.lock().await.path_for(id)
    }

    /// Iterate the full entity tree and enqueue an export job for each,
    /// idempotent by construction (a fresh vault and a partially-populated
    /// one converge to the same result).
    pub async fn full_export(&self, queue: &ExportQueue) -> crate::error::Result<()> {
        for project in self.store.find_all_projects(None).await? {
            queue.enqueue(ExportJob::ExportEntity(EntityType::Project, project.id));
        }
        for feature in self.store.find_all_features(None).await? {
            queue.enqueue(ExportJob::ExportEntity(EntityType::Feature, feature.id));
        }
        for task in self.store.find_all_tasks(None).await? {
            queue.enqueue(ExportJob::ExportEntity(EntityType::Task, task.id));
        }
        Ok(())
    }

    async fn assemble(&self, entity_type: EntityType, id: EntityId) -> crate::error::Result<Option<Resolved>> {
        match entity_type {
            EntityType::Project => {
                let Some(p) = self.store.get_project(id).await? else { return Ok(None) };
                Ok(Some(Resolved {
                    name: p.name,
                    summary: p.summary,
                    status: p.status,
                    priority: None,
                    project_id: None,
                    feature_id: None,
                    tags: p.tags,
                    created_at: p.created_at,
                    modified_at: p.modified_at,
                    project_name: None,
                    feature_name: None,
                }))
            }
            EntityType::Feature => {
                let Some(f) = self.store.get_feature(id).await? else { return Ok(None) };
                let project_name = match f.project_id {
                    Some(pid) => self.store.get_project(pid).await?.map(|p| p.name),
                    None => None,
                };
                Ok(Some(Resolved {
                    name: f.name,
                    summary: f.summary,
                    status: f.status,
                    priority: Some(f.priority),
                    project_id: f.project_id,
                    feature_id: None,
                    tags: f.tags,
                    created_at: f.created_at,
                    modified_at: f.modified_at,
                    project_name,
                    feature_name: None,
                }))
            }
            EntityType::Task => {
                let Some(t) = self.store.get_task(id).await? else { return Ok(None) };
                let project_name = match t.project_id {
                    Some(pid) => self.store.get_project(pid).await?.map(|p| p.name),
                    None => None,
                };
                let feature_name = match t.feature_id {
                    Some(fid) => self.store.get_feature(fid).await?.map(|f| f.name),
                    None => None,
                };
                Ok(Some(Resolved {
                    name: t.title,
                    summary: t.summary,
                    status: t.status,
                    priority: Some(t.priority),
                    project_id: t.project_id,
                    feature_id: t.feature_id,
                    tags: t.tags,
                    created_at: t.created_at,
                    modified_at: t.modified_at,
                    project_name,
                    feature_name,
                }))
            }
            EntityType::Template => Ok(None),
        }
    }

    async fn render_feature_status_table(&self, project_id_owner: EntityId) -> crate::error::Result<String> {
        let tasks = self.store.find_all_tasks(None).await?;
        let mut rows = Vec::new();
        for task in tasks.into_iter().filter(|t| t.feature_id == Some(project_id_owner)) {
            let is_terminal = self.workflow.is_terminal(EntityType::Task, &task.status).await;
            let normalized = normalize(task.status.as_str());
            rows.push((
                StatusTableRow { id: task.id, name: task.title, status: task.status.clone(), priority: task.priority },
                status_group(&normalized, is_terminal),
            ));
        }
        Ok(render::render_status_table(&rows, "Cancelled or Deferred"))
    }

    async fn render_project_status_table(&self, project_id_owner: EntityId) -> crate::error::Result<String> {
        let features = self.store.find_all_features(None).await?;
        let mut rows = Vec::new();
        for feature in features.into_iter().filter(|f| f.project_id == Some(project_id_owner)) {
            let is_terminal = self.workflow.is_terminal(EntityType::Feature, &feature.status).await;
            let normalized = normalize(feature.status.as_str());
            rows.push((
                StatusTableRow { id: feature.id, name: feature.name, status: feature.status.clone(), priority: feature.priority },
                status_group(&normalized, is_terminal),
            ));
        }
        Ok(render::render_status_table(&rows, "Archived"))
    }
}

struct Resolved {
    name: String,
    summary: String,
    status: crate::domain::Status,
    priority: Option<Priority>,
    project_id: Option<EntityId>,
    feature_id: Option<EntityId>,
    tags: crate::domain::Tags,
    created_at: chrono::DateTime<chrono::Utc>,
    modified_at: chrono::DateTime<chrono::Utc>,
    project_name: Option<String>,
    feature_name: Option<String>,
}

async fn remove_empty_ancestors(file_path: &Path, vault_root: &Path) {
    let mut dir = file_path.parent();
    while let Some(d) = dir {
        if d == vault_root || !d.starts_with(vault_root) {
            break;
        }
        match tokio::fs::read_dir(d).await {
            Ok(mut entries) => {
                if entries.next_entry().await.ok().flatten().is_some() {
                    break;
                }
            }
            Err(_) => break,
        }
        if tokio::fs::remove_dir(d).await.is_err() {
            break;
        }
        dir = d.parent();
    }
}
