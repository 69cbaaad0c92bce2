// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.
//!
//! Key derivation parameters are deliberately absent: they are fixed in
//! `myemtee-crypto` because changing them would orphan every stored entry.

use serde::{Deserialize, Serialize};

/// Top-level Myemtee configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MyemteeConfig {
    /// Client-wide settings.
    #[serde(default)]
    pub app: AppConfig,

    /// Identity provider (user pool) settings.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Credential store settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Client-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Identity provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Region hosting the user pool.
    #[serde(default = "default_region")]
    pub region: String,

    /// User pool identifier (e.g. `us-east-1_AbCdEf123`).
    #[serde(default)]
    pub user_pool_id: String,

    /// App client identifier. Required before any provider call.
    #[serde(default)]
    pub client_id: String,

    /// Endpoint override, used for local stacks and tests.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Name reported when remembering this device.
    #[serde(default = "default_device_name")]
    pub device_name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            user_pool_id: String::new(),
            client_id: String::new(),
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            device_name: default_device_name(),
        }
    }
}

impl IdentityConfig {
    /// The URL provider requests are posted to.
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(url) => url.clone(),
            None => format!("https://cognito-idp.{}.amazonaws.com/", self.region),
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_device_name() -> String {
    "myemtee-cli".to_string()
}

/// Credential store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database backing the primary tier.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Path to the JSON file backing the fallback tier. `None` keeps the
    /// fallback tier in memory only.
    #[serde(default = "default_fallback_path")]
    pub fallback_path: Option<String>,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long a cached month of calendar averages stays valid.
    #[serde(default = "default_history_cache_ttl_secs")]
    pub history_cache_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            fallback_path: default_fallback_path(),
            wal_mode: default_wal_mode(),
            history_cache_ttl_secs: default_history_cache_ttl_secs(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("myemtee").join("credentials.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("credentials.db"))
        .display()
        .to_string()
}

fn default_fallback_path() -> Option<String> {
    Some(
        dirs::data_dir()
            .map(|p| p.join("myemtee").join("credentials-fallback.json"))
            .unwrap_or_else(|| std::path::PathBuf::from("credentials-fallback.json"))
            .display()
            .to_string(),
    )
}

fn default_wal_mode() -> bool {
    true
}

fn default_history_cache_ttl_secs() -> u64 {
    300
}
