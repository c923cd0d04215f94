//! Opaque 128-bit entity identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for any entity (project, feature, task, section,
/// template, or dependency edge).
///
/// Wraps a UUID in a newtype for type safety. The inner value is private so
/// the concrete id format can change without touching call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Generate a new id. Uses UUIDv7 so ids sort roughly by creation time,
    /// which keeps B-tree scans over the backing store close to insertion
    /// order without requiring a separate ordering key.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID, e.g. one parsed from a tool invocation.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse an id from its string form.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    /// The raw 16-byte big-endian representation, used as a store key.
    #[must_use]
    pub fn as_bytes(&self) -> [u8; 16] {
        *self.0.as_bytes()
    }

    /// Reconstruct an id from its raw 16-byte representation.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(EntityId::new(), EntityId::new());
    }

    #[test]
    fn round_trips_through_bytes() {
        let id = EntityId::new();
        assert_eq!(EntityId::from_bytes(id.as_bytes()), id);
    }

    #[test]
    fn round_trips_through_display_and_parse() {
        let id = EntityId::new();
        let parsed = EntityId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_malformed_string() {
        assert!(EntityId::parse("not-a-uuid").is_err());
    }
}
