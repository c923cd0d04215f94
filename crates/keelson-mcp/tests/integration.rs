//! Integration tests for keelson-mcp's tool dispatch layer.
//!
//! Exercises `Tools` methods against a real sled-backed store and a real
//! (temp-dir) vault export pipeline, end to end: container lifecycle,
//! workflow-validated status transitions, sections, templates, dependency
//! cycle rejection, batches, and tag rename.

use keelson::export::VaultExporter;
use keelson::store::SledStore;
use keelson::workflow::{WorkflowEngine, WorkflowIndex};
use keelson_mcp::context::AppContext;
use keelson_mcp::models::*;
use keelson_mcp::tools::Tools;
use rstest::rstest;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

/// Build a `Tools` instance over a fresh sled database and vault dir, both
/// cleaned up when the returned `TempDir`s drop. Uses the permissive default
/// workflow (sequential `backlog -> in-progress -> completed`, matching
/// `AppContext::from_env`'s fallback when no config is supplied).
async fn harness() -> (TempDir, TempDir, Tools) {
    let db_dir = TempDir::new().unwrap();
    let vault_dir = TempDir::new().unwrap();
    let store = Arc::new(SledStore::open(db_dir.path().join("db")).unwrap());
    let workflow = Arc::new(WorkflowEngine::new(WorkflowIndex::permissive_default()));
    let exporter =
        Arc::new(VaultExporter::open(store.clone(), workflow.clone(), vault_dir.path()).await);
    let (export_queue, consumer) = exporter.clone().spawn_consumer();
    tokio::spawn(consumer);
    let ctx = Arc::new(AppContext { store, workflow, exporter, export_queue });
    (db_dir, vault_dir, Tools::new(ctx))
}

fn data(resp: &ToolResponse) -> &Value {
    resp.data.as_ref().expect("response carried no data")
}

fn id_of(resp: &ToolResponse) -> String {
    data(resp)["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn project_lifecycle_create_update_delete() {
    let (_db, _vault, tools) = harness().await;

    let created = tools
        .manage_container(ManageContainerParams {
            operation: ContainerOperation::Create,
            entity_type: ContainerKind::Project,
            id: None,
            name: Some("Launch Platform".to_string()),
            summary: Some("Ship the thing".to_string()),
            description: None,
            status: None,
            priority: None,
            complexity: None,
            project_id: None,
            feature_id: None,
            tags: Some(vec!["infra".to_string()]),
            template_ids: None,
        })
        .await
        .unwrap();
    assert!(created.success, "{created:?}");
    let project_id = id_of(&created);

    let fetched = tools
        .query_container(QueryContainerParams {
            operation: ContainerQuery::Get,
            entity_type: ContainerKind::Project,
            id: Some(project_id.clone()),
            status: None,
            priority: None,
            tags: None,
            text_query: None,
            project_id: None,
            feature_id: None,
            limit: None,
        })
        .await
        .unwrap();
    assert!(fetched.success);
    assert_eq!(data(&fetched)["name"], "Launch Platform");

    let updated = tools
        .manage_container(ManageContainerParams {
            operation: ContainerOperation::Update,
            entity_type: ContainerKind::Project,
            id: Some(project_id.clone()),
            name: Some("Launch Platform v2".to_string()),
            summary: None,
            description: None,
            status: None,
            priority: None,
            complexity: None,
            project_id: None,
            feature_id: None,
            tags: None,
            template_ids: None,
        })
        .await
        .unwrap();
    assert!(updated.success, "{updated:?}");
    assert_eq!(data(&updated)["name"], "Launch Platform v2");

    let deleted = tools
        .manage_container(ManageContainerParams {
            operation: ContainerOperation::Delete,
            entity_type: ContainerKind::Project,
            id: Some(project_id.clone()),
            name: None,
            summary: None,
            description: None,
            status: None,
            priority: None,
            complexity: None,
            project_id: None,
            feature_id: None,
            tags: None,
            template_ids: None,
        })
        .await
        .unwrap();
    assert!(deleted.success);

    let gone = tools
        .query_container(QueryContainerParams {
            operation: ContainerQuery::Get,
            entity_type: ContainerKind::Project,
            id: Some(project_id),
            status: None,
            priority: None,
            tags: None,
            text_query: None,
            project_id: None,
            feature_id: None,
            limit: None,
        })
        .await
        .unwrap();
    assert!(!gone.success);
    assert_eq!(gone.error.unwrap().code, "RESOURCE_NOT_FOUND");
}

#[tokio::test]
async fn task_status_update_follows_sequential_flow() {
    let (_db, _vault, tools) = harness().await;

    let created = tools
        .manage_container(ManageContainerParams {
            operation: ContainerOperation::Create,
            entity_type: ContainerKind::Task,
            id: None,
            name: Some("Wire up CI".to_string()),
            summary: Some("s".to_string()),
            description: None,
            status: None,
            priority: None,
            complexity: Some(3),
            project_id: None,
            feature_id: None,
            tags: None,
            template_ids: None,
        })
        .await
        .unwrap();
    assert!(created.success);
    let task_id = id_of(&created);
    assert_eq!(data(&created)["status"], "backlog");

    // backlog -> completed directly is not a valid sequential transition.
    let bad = tools
        .manage_container(ManageContainerParams {
            operation: ContainerOperation::Update,
            entity_type: ContainerKind::Task,
            id: Some(task_id.clone()),
            name: None,
            summary: None,
            description: None,
            status: Some("completed".to_string()),
            priority: None,
            complexity: None,
            project_id: None,
            feature_id: None,
            tags: None,
            template_ids: None,
        })
        .await
        .unwrap();
    assert!(!bad.success);
    assert_eq!(bad.error.unwrap().code, "VALIDATION_ERROR");

    let ok = tools
        .manage_container(ManageContainerParams {
            operation: ContainerOperation::Update,
            entity_type: ContainerKind::Task,
            id: Some(task_id),
            name: None,
            summary: None,
            description: None,
            status: Some("in-progress".to_string()),
            priority: None,
            complexity: None,
            project_id: None,
            feature_id: None,
            tags: None,
            template_ids: None,
        })
        .await
        .unwrap();
    assert!(ok.success, "{ok:?}");
    assert_eq!(data(&ok)["status"], "in-progress");
}

#[tokio::test]
async fn sections_add_update_reorder_delete() {
    let (_db, _vault, tools) = harness().await;

    let project = tools
        .manage_container(ManageContainerParams {
            operation: ContainerOperation::Create,
            entity_type: ContainerKind::Project,
            id: None,
            name: Some("Docs".to_string()),
            summary: Some("s".to_string()),
            description: None,
            status: None,
            priority: None,
            complexity: None,
            project_id: None,
            feature_id: None,
            tags: None,
            template_ids: None,
        })
        .await
        .unwrap();
    let project_id = id_of(&project);

    let mut section_ids = Vec::new();
    for title in ["Overview", "Risks"] {
        let added = tools
            .manage_sections(ManageSectionsParams {
                operation: SectionOperation::Add,
                entity_type: ContainerKind::Project,
                entity_id: project_id.clone(),
                section_id: None,
                title: Some(title.to_string()),
                usage_description: Some("context for agents".to_string()),
                content: Some(format!("{title} content")),
                content_format: Some("markdown".to_string()),
                tags: None,
                ordered_ids: None,
            })
            .await
            .unwrap();
        assert!(added.success, "{added:?}");
        section_ids.push(id_of(&added));
    }

    let listed = tools
        .query_sections(QuerySectionsParams {
            entity_type: ContainerKind::Project,
            entity_id: project_id.clone(),
            tags: None,
            text_query: None,
        })
        .await
        .unwrap();
    assert_eq!(data(&listed).as_array().unwrap().len(), 2);

    let reordered = tools
        .manage_sections(ManageSectionsParams {
            operation: SectionOperation::Reorder,
            entity_type: ContainerKind::Project,
            entity_id: project_id.clone(),
            section_id: None,
            title: None,
            usage_description: None,
            content: None,
            content_format: None,
            tags: None,
            ordered_ids: Some(vec![section_ids[1].clone(), section_ids[0].clone()]),
        })
        .await
        .unwrap();
    assert!(reordered.success, "{reordered:?}");

    let deleted = tools
        .manage_sections(ManageSectionsParams {
            operation: SectionOperation::Delete,
            entity_type: ContainerKind::Project,
            entity_id: project_id,
            section_id: Some(section_ids[0].clone()),
            title: None,
            usage_description: None,
            content: None,
            content_format: None,
            tags: None,
            ordered_ids: None,
        })
        .await
        .unwrap();
    assert!(deleted.success);
}

#[tokio::test]
async fn template_apply_materializes_sections() {
    let (_db, _vault, tools) = harness().await;

    let template = tools
        .manage_template(ManageTemplateParams {
            operation: TemplateOperation::Create,
            id: None,
            name: Some("Bug Template".to_string()),
            description: Some("standard bug sections".to_string()),
            target_entity_type: Some(ContainerKind::Task),
            is_enabled: Some(true),
            sections: Some(vec![SectionPrototypeParams {
                title: "Repro Steps".to_string(),
                usage_description: "how to reproduce".to_string(),
                content: "1. ...".to_string(),
                content_format: Some("markdown".to_string()),
                tags: None,
            }]),
        })
        .await
        .unwrap();
    assert!(template.success, "{template:?}");
    let template_id = id_of(&template);

    let task = tools
        .manage_container(ManageContainerParams {
            operation: ContainerOperation::Create,
            entity_type: ContainerKind::Task,
            id: None,
            name: Some("Fix crash".to_string()),
            summary: Some("s".to_string()),
            description: None,
            status: None,
            priority: None,
            complexity: None,
            project_id: None,
            feature_id: None,
            tags: None,
            template_ids: None,
        })
        .await
        .unwrap();
    let task_id = id_of(&task);

    let applied = tools
        .apply_template(ApplyTemplateParams {
            template_ids: vec![template_id],
            entity_type: ContainerKind::Task,
            entity_id: task_id.clone(),
            mode: None,
        })
        .await
        .unwrap();
    assert!(applied.success, "{applied:?}");
    assert_eq!(data(&applied).as_array().unwrap().len(), 1);

    let sections = tools
        .query_sections(QuerySectionsParams {
            entity_type: ContainerKind::Task,
            entity_id: task_id,
            tags: None,
            text_query: None,
        })
        .await
        .unwrap();
    assert_eq!(data(&sections).as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn dependency_cycle_is_rejected() {
    let (_db, _vault, tools) = harness().await;

    let mut ids = Vec::new();
    for name in ["A", "B"] {
        let task = tools
            .manage_container(ManageContainerParams {
                operation: ContainerOperation::Create,
                entity_type: ContainerKind::Task,
                id: None,
                name: Some(name.to_string()),
                summary: Some("s".to_string()),
                description: None,
                status: None,
                priority: None,
                complexity: None,
                project_id: None,
                feature_id: None,
                tags: None,
                template_ids: None,
            })
            .await
            .unwrap();
        ids.push(id_of(&task));
    }

    let forward = tools
        .manage_dependency(ManageDependencyParams {
            operation: DependencyOperation::Add,
            from_task_id: ids[0].clone(),
            to_task_id: ids[1].clone(),
            dependency_type: Some("blocks".to_string()),
        })
        .await
        .unwrap();
    assert!(forward.success, "{forward:?}");

    let cyclic = tools
        .manage_dependency(ManageDependencyParams {
            operation: DependencyOperation::Add,
            from_task_id: ids[1].clone(),
            to_task_id: ids[0].clone(),
            dependency_type: Some("blocks".to_string()),
        })
        .await
        .unwrap();
    assert!(!cyclic.success);
    assert_eq!(cyclic.error.unwrap().code, "VALIDATION_ERROR");
}

#[rstest]
#[case("count")]
#[case("alpha")]
#[tokio::test]
async fn tags_listed_and_renamed(#[case] sort: &str) {
    let (_db, _vault, tools) = harness().await;

    tools
        .manage_container(ManageContainerParams {
            operation: ContainerOperation::Create,
            entity_type: ContainerKind::Project,
            id: None,
            name: Some("P".to_string()),
            summary: Some("s".to_string()),
            description: None,
            status: None,
            priority: None,
            complexity: None,
            project_id: None,
            feature_id: None,
            tags: Some(vec!["Urgent".to_string()]),
            template_ids: None,
        })
        .await
        .unwrap();

    let listed = tools
        .list_tags(ListTagsParams { sort: Some(sort.to_string()) })
        .await
        .unwrap();
    assert!(listed.success);
    let tags = data(&listed).as_array().unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0]["tag"], "Urgent");

    let renamed = tools
        .rename_tag(RenameTagParams { from: "urgent".to_string(), to: "critical".to_string() })
        .await
        .unwrap();
    assert!(renamed.success, "{renamed:?}");

    let usage = tools
        .get_tag_usage(GetTagUsageParams { tag: "critical".to_string() })
        .await
        .unwrap();
    assert_eq!(data(&usage)["count"], 1);
}

#[tokio::test]
async fn dependency_batches_topologically_order_tasks() {
    let (_db, _vault, tools) = harness().await;

    let project = tools
        .manage_container(ManageContainerParams {
            operation: ContainerOperation::Create,
            entity_type: ContainerKind::Project,
            id: None,
            name: Some("Rollout".to_string()),
            summary: Some("s".to_string()),
            description: None,
            status: None,
            priority: None,
            complexity: None,
            project_id: None,
            feature_id: None,
            tags: None,
            template_ids: None,
        })
        .await
        .unwrap();
    let project_id = id_of(&project);

    let mut task_ids = Vec::new();
    for name in ["Provision", "Deploy"] {
        let task = tools
            .manage_container(ManageContainerParams {
                operation: ContainerOperation::Create,
                entity_type: ContainerKind::Task,
                id: None,
                name: Some(name.to_string()),
                summary: Some("s".to_string()),
                description: None,
                status: None,
                priority: None,
                complexity: None,
                project_id: Some(project_id.clone()),
                feature_id: None,
                tags: None,
                template_ids: None,
            })
            .await
            .unwrap();
        task_ids.push(id_of(&task));
    }
    tools
        .manage_dependency(ManageDependencyParams {
            operation: DependencyOperation::Add,
            from_task_id: task_ids[1].clone(),
            to_task_id: task_ids[0].clone(),
            dependency_type: Some("blocks".to_string()),
        })
        .await
        .unwrap();

    let batches = tools
        .query_dependencies(QueryDependenciesParams {
            operation: DependencyQuery::Batches,
            task_id: None,
            project_id: Some(project_id),
            feature_id: None,
        })
        .await
        .unwrap();
    assert!(batches.success, "{batches:?}");
    let batches = data(&batches).as_array().unwrap();
    assert_eq!(batches.len(), 2);
}

#[tokio::test]
async fn rebuild_vault_writes_markdown_file_for_project() {
    let (_db, vault, tools) = harness().await;

    let created = tools
        .manage_container(ManageContainerParams {
            operation: ContainerOperation::Create,
            entity_type: ContainerKind::Project,
            id: None,
            name: Some("Vaulted".to_string()),
            summary: Some("s".to_string()),
            description: None,
            status: None,
            priority: None,
            complexity: None,
            project_id: None,
            feature_id: None,
            tags: None,
            template_ids: None,
        })
        .await
        .unwrap();
    assert!(created.success);

    let rebuilt = tools.rebuild_vault(RebuildVaultParams {}).await.unwrap();
    assert!(rebuilt.success);

    // The export queue drains asynchronously; give the consumer a moment.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let mut found = false;
    let mut stack = vec![vault.path().to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|e| e == "md") {
                found = true;
            }
        }
    }
    assert!(found, "expected at least one exported markdown file");
}

#[tokio::test]
async fn invalid_entity_id_is_an_invalid_argument_error() {
    let (_db, _vault, tools) = harness().await;
    let result = tools
        .query_container(QueryContainerParams {
            operation: ContainerQuery::Get,
            entity_type: ContainerKind::Project,
            id: Some("not-a-uuid".to_string()),
            status: None,
            priority: None,
            tags: None,
            text_query: None,
            project_id: None,
            feature_id: None,
            limit: None,
        })
        .await;
    assert!(result.is_err());
}
