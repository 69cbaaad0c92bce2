// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-tier credential store implementing `KeyValueStore`.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use myemtee_config::model::StorageConfig;
use myemtee_core::{AdapterType, HealthStatus, KeyValueStore, MyemteeError, PluginAdapter};

use crate::database::{Database, is_connection_closed};
use crate::fallback::FallbackStore;

#[derive(Debug, Clone, Copy)]
enum Op<'a> {
    Get(&'a str),
    Set(&'a str, &'a str),
    Remove(&'a str),
}

/// Credential store backed by SQLite, falling back to a JSON file.
///
/// The SQLite handle is opened on first use and shared by every caller. If
/// the handle reports itself closed, it is dropped and one retry is made with
/// a freshly opened handle. Any remaining primary failure sends the operation
/// to the fallback tier; only when both tiers fail does the caller see an error.
///
/// Writes and removals made during an outage are journaled in the fallback
/// tier and replayed into SQLite before the primary serves anything again,
/// so a token cleared or replaced during an outage never resurfaces.
pub struct CredentialStore {
    config: StorageConfig,
    primary: Mutex<Option<Database>>,
    fallback: FallbackStore,
    /// Held for the whole of each operation so replay and fallback writes
    /// cannot interleave.
    serial: Mutex<()>,
}

impl CredentialStore {
    /// Create a store for `config`. Nothing is opened until the first operation.
    pub fn new(config: StorageConfig) -> Self {
        let fallback = match &config.fallback_path {
            Some(path) => FallbackStore::open(path),
            None => FallbackStore::in_memory(),
        };
        Self {
            config,
            primary: Mutex::new(None),
            fallback,
            serial: Mutex::new(()),
        }
    }

    /// Return the shared handle, opening it if needed.
    async fn handle(&self) -> Result<Database, MyemteeError> {
        let mut guard = self.primary.lock().await;
        if let Some(db) = guard.as_ref() {
            return Ok(db.clone());
        }
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        *guard = Some(db.clone());
        Ok(db)
    }

    async fn discard_handle(&self) {
        self.primary.lock().await.take();
    }

    async fn run_on(db: &Database, op: &Op<'_>) -> Result<Option<String>, MyemteeError> {
        match *op {
            Op::Get(key) => db.get(key).await,
            Op::Set(key, value) => db.set(key, value).await.map(|()| None),
            Op::Remove(key) => db.remove(key).await.map(|()| None),
        }
    }

    async fn try_primary(&self, op: &Op<'_>) -> Result<Option<String>, MyemteeError> {
        let db = self.handle().await?;
        Self::run_on(&db, op).await
    }

    async fn primary(&self, op: &Op<'_>) -> Result<Option<String>, MyemteeError> {
        match self.try_primary(op).await {
            Err(e) if is_connection_closed(&e) => {
                debug!("credential database handle was closed, reopening");
                self.discard_handle().await;
                self.try_primary(op).await
            }
            other => other,
        }
    }

    fn fallback(&self, op: &Op<'_>) -> Result<Option<String>, MyemteeError> {
        match *op {
            Op::Get(key) => self.fallback.get(key),
            Op::Set(key, value) => self.fallback.set(key, value).map(|()| None),
            Op::Remove(key) => self.fallback.remove(key).map(|()| None),
        }
    }

    /// Apply changes journaled during an outage to the primary tier.
    async fn replay_pending(&self) -> Result<(), MyemteeError> {
        let pending = self.fallback.pending()?;
        if pending.is_empty() {
            return Ok(());
        }
        for (key, value) in &pending {
            let op = match value {
                Some(value) => Op::Set(key, value),
                None => Op::Remove(key),
            };
            self.primary(&op).await?;
        }
        if let Err(e) = self.fallback.acknowledge(&pending) {
            warn!(error = %e, "replayed fallback changes but could not clear them");
        }
        info!(count = pending.len(), "replayed fallback changes into credential database");
        Ok(())
    }

    async fn execute(&self, op: Op<'_>) -> Result<Option<String>, MyemteeError> {
        let _serial = self.serial.lock().await;

        let primary = match self.replay_pending().await {
            Ok(()) => self.primary(&op).await,
            Err(e) => Err(e),
        };
        let primary_err = match primary {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        warn!(error = %primary_err, "credential database unavailable, using fallback store");
        self.fallback(&op).map_err(|fallback_err| {
            MyemteeError::storage(format!(
                "both credential tiers failed: primary: {primary_err}; fallback: {fallback_err}"
            ))
        })
    }
}

#[async_trait]
impl PluginAdapter for CredentialStore {
    fn name(&self) -> &str {
        "sqlite-credentials"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::CredentialStore
    }

    async fn health_check(&self) -> Result<HealthStatus, MyemteeError> {
        let primary = match self.handle().await {
            Ok(db) => db.ping().await,
            Err(e) => Err(e),
        };
        match primary {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => match self.fallback.get("") {
                Ok(_) => Ok(HealthStatus::Degraded(format!(
                    "primary tier unavailable ({e}), using fallback"
                ))),
                Err(fe) => Ok(HealthStatus::Unhealthy(format!(
                    "primary: {e}; fallback: {fe}"
                ))),
            },
        }
    }

    async fn shutdown(&self) -> Result<(), MyemteeError> {
        if let Some(db) = self.primary.lock().await.take() {
            db.close().await?;
            debug!("credential database closed");
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for CredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, MyemteeError> {
        self.execute(Op::Get(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), MyemteeError> {
        self.execute(Op::Set(key, value)).await.map(|_| ())
    }

    async fn remove(&self, key: &str) -> Result<(), MyemteeError> {
        self.execute(Op::Remove(key)).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};
    use tracing_test::traced_test;

    fn make_config(dir: &TempDir) -> StorageConfig {
        StorageConfig {
            database_path: dir.path().join("creds.db").display().to_string(),
            fallback_path: Some(dir.path().join("fallback.json").display().to_string()),
            wal_mode: true,
            history_cache_ttl_secs: 300,
        }
    }

    /// A database path whose parent is a regular file, so opening always fails.
    fn unopenable_config(dir: &TempDir) -> StorageConfig {
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        StorageConfig {
            database_path: blocker.join("creds.db").display().to_string(),
            ..make_config(dir)
        }
    }

    /// Close the handle and put a directory where the database file was, so
    /// the next open fails. Returns where the real file was moved.
    async fn take_primary_down(store: &CredentialStore) -> std::path::PathBuf {
        store.shutdown().await.unwrap();
        let db = std::path::PathBuf::from(&store.config.database_path);
        let aside = db.with_extension("db.aside");
        std::fs::rename(&db, &aside).unwrap();
        std::fs::create_dir(&db).unwrap();
        aside
    }

    fn bring_primary_back(store: &CredentialStore, aside: &std::path::Path) {
        let db = std::path::PathBuf::from(&store.config.database_path);
        std::fs::remove_dir(&db).unwrap();
        std::fs::rename(aside, &db).unwrap();
    }

    #[tokio::test]
    async fn store_reports_adapter_identity() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(make_config(&dir));
        assert_eq!(store.name(), "sqlite-credentials");
        assert_eq!(store.version(), semver::Version::new(0, 1, 0));
        assert_eq!(store.adapter_type(), AdapterType::CredentialStore);
    }

    #[tokio::test]
    async fn nothing_is_opened_until_first_use() {
        let dir = tempdir().unwrap();
        let config = make_config(&dir);
        let db_path = std::path::PathBuf::from(&config.database_path);
        let store = CredentialStore::new(config);
        assert!(!db_path.exists());

        store.set("access_token", "a1").await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn primary_round_trip() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(make_config(&dir));

        store.set("refresh_token", "r1").await.unwrap();
        assert_eq!(store.get("refresh_token").await.unwrap().as_deref(), Some("r1"));
        store.remove("refresh_token").await.unwrap();
        assert_eq!(store.get("refresh_token").await.unwrap(), None);
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn closed_handle_is_reopened_once() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(make_config(&dir));
        store.set("id_token", "i1").await.unwrap();

        let conn = store
            .primary
            .lock()
            .await
            .as_ref()
            .unwrap()
            .connection()
            .clone();
        conn.close().await.unwrap();

        assert_eq!(store.get("id_token").await.unwrap().as_deref(), Some("i1"));
        // Served by the primary tier, not the fallback.
        assert_eq!(store.fallback.get("id_token").unwrap(), None);
    }

    #[tokio::test]
    #[traced_test]
    async fn unavailable_primary_uses_fallback() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(unopenable_config(&dir));

        store.set("device_key:alice", "dk-1").await.unwrap();
        assert_eq!(
            store.get("device_key:alice").await.unwrap().as_deref(),
            Some("dk-1")
        );
        assert!(logs_contain("using fallback store"));
        assert!(matches!(
            store.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));

        let reopened = FallbackStore::open(dir.path().join("fallback.json"));
        assert_eq!(reopened.get("device_key:alice").unwrap().as_deref(), Some("dk-1"));
    }

    #[tokio::test]
    async fn pending_fallback_change_is_replayed_before_removal() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(make_config(&dir));
        store.fallback.set("access_token", "stale").unwrap();

        store.remove("access_token").await.unwrap();
        assert_eq!(store.fallback.get("access_token").unwrap(), None);
    }

    #[tokio::test]
    async fn removal_during_outage_stays_removed() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(make_config(&dir));
        store.set("refresh_token", "r-old").await.unwrap();

        let aside = take_primary_down(&store).await;
        store.remove("refresh_token").await.unwrap();
        assert_eq!(store.get("refresh_token").await.unwrap(), None);

        bring_primary_back(&store, &aside);
        assert_eq!(store.get("refresh_token").await.unwrap(), None);
        assert!(store.fallback.pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_during_outage_wins_after_recovery() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(make_config(&dir));
        store.set("access_token", "a-old").await.unwrap();

        let aside = take_primary_down(&store).await;
        store.set("access_token", "a-new").await.unwrap();
        assert_eq!(store.get("access_token").await.unwrap().as_deref(), Some("a-new"));

        bring_primary_back(&store, &aside);
        assert_eq!(store.get("access_token").await.unwrap().as_deref(), Some("a-new"));

        // The replayed value now lives in the primary tier.
        store.shutdown().await.unwrap();
        let db = Database::open(&store.config.database_path, true).await.unwrap();
        assert_eq!(db.get("access_token").await.unwrap().as_deref(), Some("a-new"));
    }

    #[tokio::test]
    async fn outage_changes_replay_after_restart() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(make_config(&dir));
        store.set("id_token", "i-old").await.unwrap();
        store.set("access_token", "a-old").await.unwrap();

        let aside = take_primary_down(&store).await;
        store.remove("id_token").await.unwrap();
        store.set("access_token", "a-new").await.unwrap();
        bring_primary_back(&store, &aside);
        drop(store);

        let store = CredentialStore::new(make_config(&dir));
        assert_eq!(store.get("id_token").await.unwrap(), None);
        assert_eq!(store.get("access_token").await.unwrap().as_deref(), Some("a-new"));
    }

    #[tokio::test]
    async fn both_tiers_failing_is_a_storage_error() {
        let dir = tempdir().unwrap();
        let mut config = unopenable_config(&dir);
        let blocker = dir.path().join("not-a-dir");
        config.fallback_path = Some(blocker.join("fallback.json").display().to_string());
        let store = CredentialStore::new(config);

        let err = store.set("access_token", "a1").await.unwrap_err();
        assert!(matches!(err, MyemteeError::Storage { .. }));
        assert!(err.to_string().contains("both credential tiers failed"));
    }

    #[tokio::test]
    async fn shutdown_closes_and_allows_reopen() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(make_config(&dir));
        store.set("access_token", "a1").await.unwrap();
        store.shutdown().await.unwrap();

        assert_eq!(store.get("access_token").await.unwrap().as_deref(), Some("a1"));
    }
}
