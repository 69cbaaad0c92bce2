// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Month-keyed cache of calendar averages.
//!
//! Stored as a single JSON blob under [`CredentialKey::HistoryCache`] so the
//! session layer can drop it with one removal on sign-in and sign-out.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use myemtee_core::{KeyValueStore, MyemteeError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::keys::CredentialKey;

/// Day (`YYYY-MM-DD`) to rounded average feeling.
pub type MonthAverages = BTreeMap<String, i64>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CachedHistory {
    months: BTreeMap<String, CachedMonth>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedMonth {
    /// Unix seconds.
    saved_at: i64,
    days: MonthAverages,
}

pub struct HistoryCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl HistoryCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Cached averages for `month` (`YYYY-MM`), if present and younger than the TTL.
    pub async fn get_month(&self, month: &str) -> Result<Option<MonthAverages>, MyemteeError> {
        let now = chrono::Utc::now().timestamp();
        let mut cached = self.load().await?;
        let Some(entry) = cached.months.remove(month) else {
            return Ok(None);
        };
        let age = now.saturating_sub(entry.saved_at);
        if age < 0 || age as u64 >= self.ttl.as_secs() {
            debug!(month, age, "history cache entry expired");
            return Ok(None);
        }
        Ok(Some(entry.days))
    }

    /// Store averages for `month`, replacing any previous value.
    pub async fn put_month(&self, month: &str, days: MonthAverages) -> Result<(), MyemteeError> {
        let mut cached = self.load().await?;
        cached.months.insert(
            month.to_string(),
            CachedMonth {
                saved_at: chrono::Utc::now().timestamp(),
                days,
            },
        );
        let json = serde_json::to_string(&cached).map_err(|e| MyemteeError::Storage {
            source: Box::new(e),
        })?;
        self.store
            .set(&CredentialKey::HistoryCache.to_string(), &json)
            .await
    }

    pub async fn clear(&self) -> Result<(), MyemteeError> {
        self.store
            .remove(&CredentialKey::HistoryCache.to_string())
            .await
    }

    async fn load(&self) -> Result<CachedHistory, MyemteeError> {
        let Some(json) = self
            .store
            .get(&CredentialKey::HistoryCache.to_string())
            .await?
        else {
            return Ok(CachedHistory::default());
        };
        Ok(serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!(error = %e, "discarding unreadable history cache");
            CachedHistory::default()
        }))
    }
}
