//! Error types shared across the store, workflow engine, template engine,
//! dependency graph, and export pipeline.

use crate::id::EntityId;
use std::io;
use thiserror::Error;

/// The coarse-grained kind of a store-layer failure, matching the
/// classification mutating entity-store methods must surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The referenced entity does not exist.
    NotFound,
    /// The supplied data failed validation.
    ValidationError,
    /// The operation conflicts with existing state (duplicate edge, duplicate
    /// tag name, duplicate section title under `mode = error`, ...).
    ConflictError,
    /// The backing store reported a failure (I/O, transaction, migration).
    DatabaseError,
    /// An error occurred that does not fit the other kinds.
    UnknownError,
}

/// Configuration-loading errors (workflow config, environment wiring).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The workflow config YAML could not be parsed.
    #[error("failed to parse workflow config '{path}': {source}")]
    Parse {
        /// Path to the config file that failed to parse.
        path: String,
        /// The underlying YAML parse error.
        source: serde_yaml::Error,
    },

    /// The config was syntactically valid YAML but semantically invalid,
    /// e.g. a `flow_mappings` entry naming an unknown flow, or a kind with no
    /// `default_flow`.
    #[error("invalid workflow config: {0}")]
    Invalid(String),

    /// The config file could not be read from disk.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path that could not be read.
        path: String,
        /// The underlying IO error.
        source: io::Error,
    },
}

/// Entity-store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced entity does not exist.
    #[error("entity not found: {0}")]
    NotFound(EntityId),

    /// The supplied entity data failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing sled store reported a failure.
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    /// A stored value failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A cross-row invariant could not be enforced within the retry budget.
    #[error("transaction conflict exceeded retry budget for {operation}")]
    RetryBudgetExceeded {
        /// The operation that kept hitting transaction conflicts.
        operation: String,
    },
}

impl StoreError {
    /// Classify this error into the coarse kind the entity store contract
    /// requires mutating methods to report.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Conflict(_) => ErrorKind::ConflictError,
            Self::Database(_) | Self::RetryBudgetExceeded { .. } => ErrorKind::DatabaseError,
            Self::Serialization(_) => ErrorKind::UnknownError,
        }
    }
}

/// Status workflow engine errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkflowError {
    /// The proposed status is not reachable from the current one under the
    /// active flow's rules.
    #[error("terminal status cannot transition: {status}")]
    Terminal {
        /// The terminal status the entity is currently in.
        status: String,
    },

    /// Neither the current nor proposed status appears in the active flow.
    #[error("status not in active flow: {status}")]
    NotInFlow {
        /// The status missing from the flow.
        status: String,
    },

    /// A backward transition was attempted while `allow_backward` is false.
    #[error("backward transition blocked: {from} -> {to}")]
    BackwardBlocked {
        /// Current status.
        from: String,
        /// Proposed status.
        to: String,
    },

    /// A transition skipped an intermediate status while `enforce_sequential`
    /// is true.
    #[error("sequential transition blocked: {from} -> {to}, expected next {expected}")]
    SkipBlocked {
        /// Current status.
        from: String,
        /// Proposed status.
        to: String,
        /// The status that must come next.
        expected: String,
    },

    /// A prerequisite predicate failed; `blockers` enumerates concrete causes.
    #[error("prerequisites not satisfied: {blockers:?}")]
    PrerequisitesNotMet {
        /// Human-readable descriptions of each unmet prerequisite.
        blockers: Vec<String>,
    },

    /// No config is loaded for the requested entity kind.
    #[error("no workflow config for entity kind: {0}")]
    UnknownKind(String),
}

/// Template engine errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A referenced template id does not exist.
    #[error("template not found: {0}")]
    NotFound(EntityId),

    /// The template targets a different entity type than requested.
    #[error("template '{template}' targets {expected:?}, cannot apply to {actual:?}")]
    TypeMismatch {
        /// The mismatched template's id.
        template: EntityId,
        /// The entity type the template is restricted to.
        expected: String,
        /// The entity type it was applied to.
        actual: String,
    },

    /// `mode = error` and a duplicate section title was found.
    #[error("duplicate section title '{title}' on target")]
    DuplicateTitle {
        /// The offending title.
        title: String,
    },

    /// A section prototype failed schema validation.
    #[error("section prototype invalid: {0}")]
    InvalidSection(String),
}

/// Dependency graph errors.
#[derive(Debug, Error)]
pub enum DependencyError {
    /// `from == to`.
    #[error("a task cannot depend on itself: {0}")]
    SelfLoop(EntityId),

    /// The same (from, to, type) edge already exists.
    #[error("dependency already exists: {from} -> {to}")]
    Duplicate {
        /// Source task.
        from: EntityId,
        /// Target task.
        to: EntityId,
    },

    /// Adding this BLOCKS edge would close a cycle.
    #[error("adding {from} -> {to} would create a cycle: {path:?}")]
    CycleDetected {
        /// Source task.
        from: EntityId,
        /// Target task.
        to: EntityId,
        /// The offending path from `to` back to `from`.
        path: Vec<EntityId>,
    },

    /// The referenced dependency edge does not exist.
    #[error("dependency not found: {from} -> {to}")]
    NotFound {
        /// Source task.
        from: EntityId,
        /// Target task.
        to: EntityId,
    },
}

/// Markdown export pipeline errors. Per design, these are always logged and
/// never surfaced to the tool caller, but they still need a typed shape for
/// logging and for tests.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Writing the rendered Markdown file failed.
    #[error("failed to write export file '{path}': {source}")]
    Write {
        /// Path that failed to write.
        path: String,
        /// Underlying IO error.
        source: io::Error,
    },

    /// Reading or writing the sync-state index failed.
    #[error("sync-state index error: {0}")]
    SyncState(String),

    /// The export queue was saturated and the job was dropped.
    #[error("export queue saturated, dropped job for {0}")]
    QueueSaturated(EntityId),
}

/// The error type for keelson core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Store error.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Workflow engine error.
    #[error("{0}")]
    Workflow(#[from] WorkflowError),

    /// Template engine error.
    #[error("{0}")]
    Template(#[from] TemplateError),

    /// Dependency graph error.
    #[error("{0}")]
    Dependency(#[from] DependencyError),

    /// Export pipeline error.
    #[error("{0}")]
    Export(#[from] ExportError),
}

impl Error {
    /// Classify this error into the coarse kind the tool dispatch surface's
    /// error envelope is built from.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::DatabaseError,
            Self::Config(_) => ErrorKind::UnknownError,
            Self::Store(e) => e.kind(),
            Self::Workflow(_) => ErrorKind::ValidationError,
            Self::Template(e) => match e {
                TemplateError::NotFound(_) => ErrorKind::NotFound,
                TemplateError::TypeMismatch { .. } | TemplateError::InvalidSection(_) => {
                    ErrorKind::ValidationError
                }
                TemplateError::DuplicateTitle { .. } => ErrorKind::ConflictError,
            },
            Self::Dependency(e) => match e {
                DependencyError::SelfLoop(_) => ErrorKind::ValidationError,
                DependencyError::Duplicate { .. } => ErrorKind::ConflictError,
                DependencyError::CycleDetected { .. } => ErrorKind::ConflictError,
                DependencyError::NotFound { .. } => ErrorKind::NotFound,
            },
            Self::Export(_) => ErrorKind::UnknownError,
        }
    }
}

/// A specialized Result type for keelson core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_not_found_kind() {
        let err = StoreError::NotFound(EntityId::new());
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn store_conflict_maps_to_conflict_kind() {
        let err = StoreError::Conflict("duplicate tag".into());
        assert_eq!(err.kind(), ErrorKind::ConflictError);
    }

    #[test]
    fn dependency_cycle_maps_to_conflict_kind() {
        let err: Error = DependencyError::CycleDetected {
            from: EntityId::new(),
            to: EntityId::new(),
            path: vec![],
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::ConflictError);
    }

    #[test]
    fn template_not_found_maps_to_not_found_kind() {
        let err: Error = TemplateError::NotFound(EntityId::new()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
