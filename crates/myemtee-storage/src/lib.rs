// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential persistence for the Myemtee client.
//!
//! Tokens, cached profile claims and per-username device trust flags live in
//! a SQLite database (WAL mode, embedded migrations, single-writer via
//! `tokio-rusqlite`). When that database cannot be opened or used, a JSON
//! file takes over so a session survives a broken primary tier.

pub mod adapter;
pub mod database;
pub mod fallback;
pub mod history;
pub mod keys;

pub use adapter::CredentialStore;
pub use database::Database;
pub use fallback::FallbackStore;
pub use history::{HistoryCache, MonthAverages};
pub use keys::CredentialKey;
