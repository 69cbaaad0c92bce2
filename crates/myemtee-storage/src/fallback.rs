// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous fallback tier: a JSON object on disk, or in memory only.
//!
//! The tier only ever holds changes made while the primary tier was down.
//! A removal is kept as a `null` tombstone so it can be replayed later;
//! a string value is a pending write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use myemtee_core::MyemteeError;
use tracing::warn;

/// A change recorded while the primary tier was unavailable.
/// `None` is a removal.
pub type PendingChange = (String, Option<String>);

type Journal = BTreeMap<String, Option<String>>;

/// Journal of outage writes and removals, mirrored to a JSON file after
/// every change.
#[derive(Debug)]
pub struct FallbackStore {
    path: Option<PathBuf>,
    entries: Mutex<Journal>,
}

impl FallbackStore {
    /// Load the store from `path`. A missing file starts empty; an unreadable
    /// one is logged and ignored.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "fallback store is corrupt, starting empty");
                Journal::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Journal::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "fallback store unreadable, starting empty");
                Journal::new()
            }
        };
        Self {
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    /// A fallback tier that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Journal::new()),
        }
    }

    /// The pending value for `key`. A tombstone reads as `None`.
    pub fn get(&self, key: &str) -> Result<Option<String>, MyemteeError> {
        let entries = self.lock()?;
        Ok(entries.get(key).cloned().flatten())
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), MyemteeError> {
        let mut entries = self.lock()?;
        entries.insert(key.to_string(), Some(value.to_string()));
        self.persist(&entries)
    }

    /// Record a tombstone for `key`, whether or not a value was pending.
    pub fn remove(&self, key: &str) -> Result<(), MyemteeError> {
        let mut entries = self.lock()?;
        if entries.insert(key.to_string(), None) != Some(None) {
            self.persist(&entries)?;
        }
        Ok(())
    }

    /// Every recorded change, in key order.
    pub fn pending(&self) -> Result<Vec<PendingChange>, MyemteeError> {
        let entries = self.lock()?;
        Ok(entries
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    /// Drop the given changes once they have reached the primary tier.
    /// Entries changed again since `applied` was read are kept.
    pub fn acknowledge(&self, applied: &[PendingChange]) -> Result<(), MyemteeError> {
        let mut entries = self.lock()?;
        let before = entries.len();
        for (key, value) in applied {
            if entries.get(key) == Some(value) {
                entries.remove(key);
            }
        }
        if entries.len() != before {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Journal>, MyemteeError> {
        self.entries
            .lock()
            .map_err(|_| MyemteeError::storage("fallback store lock poisoned"))
    }

    fn persist(&self, entries: &Journal) -> Result<(), MyemteeError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(entries).map_err(|e| MyemteeError::Storage {
            source: Box::new(e),
        })?;
        write_atomically(path, json.as_bytes()).map_err(|e| MyemteeError::Storage {
            source: Box::new(e),
        })
    }
}

/// Write to a sibling temp file, then rename over `path`.
fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
    }
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fallback.json");

        let store = FallbackStore::open(&path);
        store.set("id_token", "i1").unwrap();
        store.set("device_key:alice", "dk").unwrap();
        store.remove("id_token").unwrap();

        let reopened = FallbackStore::open(&path);
        assert_eq!(reopened.get("id_token").unwrap(), None);
        assert_eq!(reopened.pending().unwrap().len(), 2);
        assert_eq!(reopened.get("device_key:alice").unwrap().as_deref(), Some("dk"));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fallback.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FallbackStore::open(&path);
        assert_eq!(store.get("anything").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(FallbackStore::open(&path).get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn removal_is_kept_as_tombstone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fallback.json");

        let store = FallbackStore::open(&path);
        store.remove("refresh_token").unwrap();
        assert_eq!(store.get("refresh_token").unwrap(), None);

        let reopened = FallbackStore::open(&path);
        assert_eq!(
            reopened.pending().unwrap(),
            vec![("refresh_token".to_string(), None)]
        );
    }

    #[test]
    fn acknowledge_keeps_changes_made_after_replay_started() {
        let store = FallbackStore::in_memory();
        store.set("access_token", "a1").unwrap();
        store.remove("id_token").unwrap();
        let applied = store.pending().unwrap();

        store.set("access_token", "a2").unwrap();
        store.acknowledge(&applied).unwrap();

        assert_eq!(
            store.pending().unwrap(),
            vec![("access_token".to_string(), Some("a2".to_string()))]
        );
    }

    #[test]
    fn legacy_file_of_plain_values_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fallback.json");
        std::fs::write(&path, r#"{"id_token":"i1"}"#).unwrap();

        assert_eq!(FallbackStore::open(&path).get("id_token").unwrap().as_deref(), Some("i1"));
    }

    #[test]
    fn in_memory_store_never_touches_disk() {
        let store = FallbackStore::in_memory();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("missing").unwrap();
    }
}
