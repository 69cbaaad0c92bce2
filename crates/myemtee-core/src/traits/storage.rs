// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value persistence for tokens, device trust flags, and small caches.

use async_trait::async_trait;

use crate::error::MyemteeError;
use crate::traits::adapter::PluginAdapter;

/// Durable string key-value store.
///
/// Implementations must survive process restarts. Missing keys read as
/// `None`; removing a missing key is not an error.
#[async_trait]
pub trait KeyValueStore: PluginAdapter {
    async fn get(&self, key: &str) -> Result<Option<String>, MyemteeError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), MyemteeError>;

    async fn remove(&self, key: &str) -> Result<(), MyemteeError>;
}
