// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Myemtee integration tests.
//!
//! Provides mock adapters for fast, deterministic tests without a real
//! identity provider or on-disk store.
//!
//! # Components
//!
//! - [`MockIdentityProvider`] - scripted identity provider that records every call
//! - [`MemoryStore`] - in-memory `KeyValueStore`
//! - [`tokens`] - unsigned JWT builders with chosen expiry and subject

pub mod memory_store;
pub mod mock_identity;
pub mod tokens;

pub use memory_store::MemoryStore;
pub use mock_identity::{MockIdentityProvider, ProviderCall};
