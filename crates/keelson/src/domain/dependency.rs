//! Task-to-task dependency edges.

use crate::id::EntityId;
use serde::{Deserialize, Serialize};

/// The relationship a [`Dependency`] edge expresses between two tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyType {
    /// `to` cannot complete until `from` completes.
    Blocks,
    /// Non-blocking, informational link in either direction.
    RelatesTo,
    /// Inverse of `Blocks`; `from` is waiting on `to` to complete.
    IsBlockedBy,
}

/// A directed edge from one task to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Unique identifier for the edge itself.
    pub id: EntityId,
    /// Source task.
    pub from: EntityId,
    /// Target task.
    pub to: EntityId,
    /// Relationship type.
    pub dep_type: DependencyType,
}

/// Data required to create a new dependency edge.
#[derive(Debug, Clone)]
pub struct NewDependency {
    /// Source task.
    pub from: EntityId,
    /// Target task.
    pub to: EntityId,
    /// Relationship type.
    pub dep_type: DependencyType,
}
