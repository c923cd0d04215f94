//! Keelson - a hierarchical project/feature/task store, configurable
//! status workflow engine, template engine, dependency graph, and Markdown
//! export pipeline.

#![forbid(unsafe_code)]

pub mod domain;
pub mod error;
pub mod export;
pub mod graph;
pub mod id;
pub mod store;
pub mod templates;
pub mod workflow;
