//! MCP server for the keelson hierarchical task tracker.
//!
//! This crate exposes keelson's project/feature/task hierarchy, sections,
//! templates, dependencies, tags, status workflow, and Markdown vault export
//! to AI assistants over the Model Context Protocol.
//!
//! # Architecture
//!
//! The server uses the `rmcp` crate for MCP protocol handling and wraps the
//! `keelson` crate's `EntityStore`, `WorkflowEngine`, and `VaultExporter`
//! directly, with no intermediate storage abstraction of its own.
//!
//! # Tools
//!
//! ## Containers
//! - `manage_container` / `query_container` - create/update/delete and
//!   get/list projects, features, and tasks
//!
//! ## Sections
//! - `manage_sections` / `query_sections` - add/update/delete/reorder and
//!   list an entity's content sections
//!
//! ## Templates
//! - `manage_template` / `query_templates` / `apply_template`
//!
//! ## Dependencies
//! - `manage_dependency` / `query_dependencies`
//!
//! ## Tags
//! - `list_tags` / `rename_tag` / `get_tag_usage`
//!
//! ## Workflow and vault
//! - `get_next_status` / `rebuild_vault`

pub mod context;
pub mod error;
pub mod models;
pub mod server;
pub mod tools;

pub use error::{Error, Result};
pub use server::KeelsonMcpServer;
