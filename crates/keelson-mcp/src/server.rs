//! MCP server implementation.
//!
//! Wires the [`crate::tools::Tools`] business logic into `rmcp`'s
//! `#[tool_router]`/`#[tool_handler]` dispatch over stdio transport. Every
//! tool method here follows the same shape: parse `Parameters<P>`, call the
//! matching `Tools` method, and turn its `Result<ToolResponse>` into a
//! `CallToolResult` (domain failures arrive pre-packaged as a `success:
//! false` envelope; only a dispatch-layer [`Error`] maps to a protocol-level
//! `invalid_params`/`internal_error`).

use crate::context::AppContext;
use crate::error::Error;
use crate::models::{
    ApplyTemplateParams, GetNextStatusParams, GetTagUsageParams, ListTagsParams,
    ManageContainerParams, ManageDependencyParams, ManageSectionsParams, ManageTemplateParams,
    QueryContainerParams, QueryDependenciesParams, QuerySectionsParams, QueryTemplatesParams,
    RebuildVaultParams, RenameTagParams, ToolResponse,
};
use crate::tools::Tools;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{
    handler::server::ServerHandler, tool, tool_handler, tool_router, ErrorData as McpError,
};
use std::sync::Arc;

/// Convert a dispatch-layer error to an MCP protocol error.
///
/// Domain/business failures never reach here — `Tools` methods catch those
/// and return a `success: false` [`ToolResponse`] instead. Only malformed
/// arguments (`InvalidArgument`, `InvalidFilter`) and unexpected core errors
/// surface as a true protocol error.
fn to_mcp_error(e: &Error) -> McpError {
    match e {
        Error::InvalidArgument { .. } | Error::InvalidFilter { .. } => {
            McpError::invalid_params(e.to_string(), None)
        }
        _ => McpError::internal_error(e.to_string(), None),
    }
}

fn to_call_result(result: Result<ToolResponse, McpError>) -> Result<CallToolResult, McpError> {
    let response = result?;
    Ok(CallToolResult::success(vec![Content::json(response)?]))
}

/// The keelson MCP server: a hierarchical task-management tool surface over
/// an embedded entity store, status workflow engine, and Markdown vault
/// export pipeline.
#[derive(Clone)]
pub struct KeelsonMcpServer {
    /// Tool implementations.
    tools: Arc<Tools>,
    /// Tool router for MCP dispatch.
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl KeelsonMcpServer {
    /// Create, update, or delete a project/feature/task.
    #[tool(
        description = "Create, update, or delete a project, feature, or task. Status changes are validated against the configured status workflow. Use empty-string fields to clear description/project_id/feature_id on update."
    )]
    async fn manage_container(
        &self,
        Parameters(params): Parameters<ManageContainerParams>,
    ) -> Result<CallToolResult, McpError> {
        to_call_result(self.tools.manage_container(params).await.map_err(|e| to_mcp_error(&e)))
    }

    /// Fetch one, or list/search, projects/features/tasks.
    #[tool(
        description = "Fetch a single project/feature/task by id, or list/search them with status, priority, tag, text, and containment filters."
    )]
    async fn query_container(
        &self,
        Parameters(params): Parameters<QueryContainerParams>,
    ) -> Result<CallToolResult, McpError> {
        to_call_result(self.tools.query_container(params).await.map_err(|e| to_mcp_error(&e)))
    }

    /// Add, update, delete, or reorder an entity's content sections.
    #[tool(
        description = "Add, update, delete, or reorder a content section on a project, feature, or task."
    )]
    async fn manage_sections(
        &self,
        Parameters(params): Parameters<ManageSectionsParams>,
    ) -> Result<CallToolResult, McpError> {
        to_call_result(self.tools.manage_sections(params).await.map_err(|e| to_mcp_error(&e)))
    }

    /// List an entity's content sections.
    #[tool(description = "List a project/feature/task's content sections, optionally filtered by tag or text.")]
    async fn query_sections(
        &self,
        Parameters(params): Parameters<QuerySectionsParams>,
    ) -> Result<CallToolResult, McpError> {
        to_call_result(self.tools.query_sections(params).await.map_err(|e| to_mcp_error(&e)))
    }

    /// Create, update, or delete a template.
    #[tool(
        description = "Create a new template, enable/disable/rename an existing one, or delete a non-built-in template."
    )]
    async fn manage_template(
        &self,
        Parameters(params): Parameters<ManageTemplateParams>,
    ) -> Result<CallToolResult, McpError> {
        to_call_result(self.tools.manage_template(params).await.map_err(|e| to_mcp_error(&e)))
    }

    /// List templates, optionally filtered by target entity kind.
    #[tool(description = "List templates, optionally restricted to those targeting a given entity kind.")]
    async fn query_templates(
        &self,
        Parameters(params): Parameters<QueryTemplatesParams>,
    ) -> Result<CallToolResult, McpError> {
        to_call_result(self.tools.query_templates(params).await.map_err(|e| to_mcp_error(&e)))
    }

    /// Materialize one or more templates' sections onto a target entity.
    #[tool(
        description = "Apply one or more templates to a project/feature/task, materializing their section prototypes. Duplicate-title handling is controlled by mode: skip_duplicate (default), overwrite, or error."
    )]
    async fn apply_template(
        &self,
        Parameters(params): Parameters<ApplyTemplateParams>,
    ) -> Result<CallToolResult, McpError> {
        to_call_result(self.tools.apply_template(params).await.map_err(|e| to_mcp_error(&e)))
    }

    /// Add or remove a dependency edge between two tasks.
    #[tool(
        description = "Add or remove a dependency edge between two tasks (blocks, relates_to, or is_blocked_by). Adding a blocks edge that would create a cycle is rejected."
    )]
    async fn manage_dependency(
        &self,
        Parameters(params): Parameters<ManageDependencyParams>,
    ) -> Result<CallToolResult, McpError> {
        to_call_result(self.tools.manage_dependency(params).await.map_err(|e| to_mcp_error(&e)))
    }

    /// Query a task's dependency edges, blockers, or a scope's batches.
    #[tool(
        description = "Query a task's incoming/outgoing dependency edges, its unresolved blockers, or the topological execution batches for a project or feature's tasks."
    )]
    async fn query_dependencies(
        &self,
        Parameters(params): Parameters<QueryDependenciesParams>,
    ) -> Result<CallToolResult, McpError> {
        to_call_result(self.tools.query_dependencies(params).await.map_err(|e| to_mcp_error(&e)))
    }

    /// List every tag currently in use, with counts.
    #[tool(description = "List every tag currently in use across all entities, with usage counts, sorted by count (default) or alphabetically.")]
    async fn list_tags(
        &self,
        Parameters(params): Parameters<ListTagsParams>,
    ) -> Result<CallToolResult, McpError> {
        to_call_result(self.tools.list_tags(params).await.map_err(|e| to_mcp_error(&e)))
    }

    /// Atomically relabel a tag across every entity that carries it.
    #[tool(description = "Rename a tag across every entity that carries it (case-insensitive match, atomic bulk rewrite).")]
    async fn rename_tag(
        &self,
        Parameters(params): Parameters<RenameTagParams>,
    ) -> Result<CallToolResult, McpError> {
        to_call_result(self.tools.rename_tag(params).await.map_err(|e| to_mcp_error(&e)))
    }

    /// Usage report for a single tag.
    #[tool(description = "Report which entities currently hold a given tag (case-insensitive match).")]
    async fn get_tag_usage(
        &self,
        Parameters(params): Parameters<GetTagUsageParams>,
    ) -> Result<CallToolResult, McpError> {
        to_call_result(self.tools.get_tag_usage(params).await.map_err(|e| to_mcp_error(&e)))
    }

    /// The workflow engine's next-status recommendation for an entity.
    #[tool(
        description = "Compute the status workflow's next-status recommendation for a project/feature/task given its current state, active flow, and any unmet prerequisites."
    )]
    async fn get_next_status(
        &self,
        Parameters(params): Parameters<GetNextStatusParams>,
    ) -> Result<CallToolResult, McpError> {
        to_call_result(self.tools.get_next_status(params).await.map_err(|e| to_mcp_error(&e)))
    }

    /// Rebuild the Markdown vault from scratch.
    #[tool(description = "Re-enqueue every entity for export, rebuilding the Markdown vault from the database.")]
    async fn rebuild_vault(
        &self,
        Parameters(params): Parameters<RebuildVaultParams>,
    ) -> Result<CallToolResult, McpError> {
        to_call_result(self.tools.rebuild_vault(params).await.map_err(|e| to_mcp_error(&e)))
    }
}

impl KeelsonMcpServer {
    /// Build a new server over an [`AppContext`] assembled from the
    /// environment.
    #[must_use]
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let tools = Arc::new(Tools::new(ctx));
        Self { tools, tool_router: Self::tool_router() }
    }
}

#[tool_handler]
impl ServerHandler for KeelsonMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "keelson-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Hierarchical task-management server: projects, features, and tasks, with \
                 sections, templates, dependencies, tags, a configurable status workflow, and \
                 a Markdown vault export."
                    .into(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_info_reports_keelson() {
        let dir = tempfile::TempDir::new().unwrap();
        std::env::set_var("DATABASE_PATH", dir.path().join("db"));
        std::env::set_var("MD_VAULT_PATH", dir.path().join("vault"));
        std::env::remove_var("AGENT_CONFIG_DIR");
        let ctx = Arc::new(AppContext::from_env().await.unwrap());
        let server = KeelsonMcpServer::new(ctx);
        let info = server.get_info();
        assert_eq!(info.server_info.name, "keelson-mcp");
        assert!(info.instructions.is_some());
    }

    #[tokio::test]
    async fn tool_router_lists_every_tool() {
        let dir = tempfile::TempDir::new().unwrap();
        std::env::set_var("DATABASE_PATH", dir.path().join("db"));
        std::env::set_var("MD_VAULT_PATH", dir.path().join("vault"));
        std::env::remove_var("AGENT_CONFIG_DIR");
        let ctx = Arc::new(AppContext::from_env().await.unwrap());
        let server = KeelsonMcpServer::new(ctx);
        let tools = server.tool_router.list_all();
        let names: Vec<&str> = tools.iter().map(|t| &*t.name).collect();
        for expected in [
            "manage_container",
            "query_container",
            "manage_sections",
            "query_sections",
            "manage_template",
            "query_templates",
            "apply_template",
            "manage_dependency",
            "query_dependencies",
            "list_tags",
            "rename_tag",
            "get_tag_usage",
            "get_next_status",
            "rebuild_vault",
        ] {
            assert!(names.contains(&expected), "missing tool {expected}");
        }
    }
}
