//! Persisted mapping from entity id to the exported file path last written
//! for it, used to detect renames/moves and to locate a file for deletion.

use crate::domain::EntityType;
use crate::id::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

const SYNC_STATE_VERSION: &str = "1.0";

/// One tracked entity's last-known export location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEntityRecord {
    /// Path relative to the vault root, as a string (stable across platforms).
    pub path: String,
    #[serde(rename = "entityType")]
    pub entity_type: EntityType,
    #[serde(rename = "lastModified")]
    pub last_modified: DateTime<Utc>,
}

/// `.sync-state.json` contents: the full index of exported entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    version: String,
    #[serde(rename = "lastSync")]
    last_sync: DateTime<Utc>,
    entities: HashMap<String, SyncEntityRecord>,
}

impl SyncState {
    /// An empty index, stamped with `now`.
    #[must_use]
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            version: SYNC_STATE_VERSION.to_string(),
            last_sync: now,
            entities: HashMap::new(),
        }
    }

    /// Load the sync-state file at `path`. A missing file yields an empty
    /// index silently; a present-but-unparseable file yields an empty index
    /// with a logged warning, per the "never block export on a corrupt
    /// index" rule.
    pub async fn load(path: impl AsRef<Path>, now: DateTime<Utc>) -> Self {
        let path = path.as_ref();
        match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice::<Self>(&bytes) {
                Ok(state) => state,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "sync-state file is unreadable, starting from an empty index");
                    Self::empty(now)
                }
            },
            Err(_) => Self::empty(now),
        }
    }

    /// Persist the index atomically (temp file + rename).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the underlying atomic write fails.
    pub async fn save(&mut self, path: impl AsRef<Path>, now: DateTime<Utc>) -> crate::error::Result<()> {
        self.last_sync = now;
        let bytes = serde_json::to_vec_pretty(self).map_err(crate::error::StoreError::Serialization)?;
        keelson_jsonl::write_bytes_atomic(path, &bytes)
            .await
            .map_err(|e| crate::error::ExportError::SyncState(e.to_string()))?;
        Ok(())
    }

    /// The last path recorded for `id`, if any.
    #[must_use]
    pub fn path_for(&self, id: EntityId) -> Option<PathBuf> {
        self.entities.get(&id.to_string()).map(|r| PathBuf::from(&r.path))
    }

    /// Record (or overwrite) the export location for `id`.
    pub fn record(&mut self, id: EntityId, entity_type: EntityType, path: &Path, last_modified: DateTime<Utc>) {
        self.entities.insert(
            id.to_string(),
            SyncEntityRecord {
                path: path.display().to_string(),
                entity_type,
                last_modified,
            },
        );
    }

    /// Drop `id` from the index, returning its last known path if present.
    pub fn remove(&mut self, id: EntityId) -> Option<PathBuf> {
        self.entities.remove(&id.to_string()).map(|r| PathBuf::from(r.path))
    }

    /// All tracked ids, for iterating during a full re-export.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().filter_map(|s| EntityId::parse(s).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_missing_file_yields_empty_index() {
        let dir = TempDir::new().unwrap();
        let state = SyncState::load(dir.path().join(".sync-state.json"), Utc::now()).await;
        assert_eq!(state.entities.len(), 0);
        assert_eq!(state.version, "1.0");
    }

    #[tokio::test]
    async fn load_corrupt_file_falls_back_to_empty_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".sync-state.json");
        tokio::fs::write(&path, b"not json").await.unwrap();
        let state = SyncState::load(&path, Utc::now()).await;
        assert_eq!(state.entities.len(), 0);
    }

    #[tokio::test]
    async fn record_and_save_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".sync-state.json");
        let now = Utc::now();
        let mut state = SyncState::empty(now);
        let id = EntityId::new();
        state.record(id, EntityType::Task, Path::new("Demo/Tasks/t.md"), now);
        state.save(&path, now).await.unwrap();

        let reloaded = SyncState::load(&path, now).await;
        assert_eq!(reloaded.path_for(id), Some(PathBuf::from("Demo/Tasks/t.md")));
    }

    #[tokio::test]
    async fn remove_returns_last_known_path() {
        let now = Utc::now();
        let mut state = SyncState::empty(now);
        let id = EntityId::new();
        state.record(id, EntityType::Task, Path::new("Demo/Tasks/t.md"), now);
        let removed = state.remove(id);
        assert_eq!(removed, Some(PathBuf::from("Demo/Tasks/t.md")));
        assert!(state.path_for(id).is_none());
    }
}
