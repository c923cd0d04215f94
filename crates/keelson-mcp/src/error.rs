//! Error types for the keelson MCP server.

use thiserror::Error;

/// Errors that can occur in the keelson MCP server's dispatch layer, as
/// opposed to errors surfaced from the underlying [`keelson`] crate (which
/// are wrapped via `Storage`/`Workflow`/`Template`/`Dependency`/`Export`).
#[derive(Debug, Error)]
pub enum Error {
    /// A filter string failed to parse (e.g. `"a,b,!c"`).
    #[error("invalid filter '{field}': {value}")]
    InvalidFilter {
        /// The field the filter was applied to.
        field: &'static str,
        /// The invalid filter text.
        value: String,
    },

    /// An unknown entity kind was supplied where one of a fixed set was
    /// required.
    #[error("invalid {field}: '{value}'. Valid values: {valid_values}")]
    InvalidArgument {
        /// The field name that had an invalid value.
        field: &'static str,
        /// The invalid value that was provided.
        value: String,
        /// Description of valid values.
        valid_values: &'static str,
    },

    /// An error from the keelson core (store, workflow, template,
    /// dependency, or export layer).
    #[error("{0}")]
    Core(#[from] keelson::error::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The stable tool-facing error code, matching the documented error
    /// kind vocabulary.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidFilter { .. } | Error::InvalidArgument { .. } => "VALIDATION_ERROR",
            Error::Json(_) => "UNKNOWN_ERROR",
            Error::Core(err) => match err.kind() {
                keelson::error::ErrorKind::NotFound => "RESOURCE_NOT_FOUND",
                keelson::error::ErrorKind::ValidationError => "VALIDATION_ERROR",
                keelson::error::ErrorKind::ConflictError => "DUPLICATE_RESOURCE",
                keelson::error::ErrorKind::DatabaseError => "DATABASE_ERROR",
                keelson::error::ErrorKind::UnknownError => "UNKNOWN_ERROR",
            },
        }
    }
}

/// Result type for keelson MCP operations.
pub type Result<T> = std::result::Result<T, Error>;
