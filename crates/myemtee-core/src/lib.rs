// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Myemtee mood tracker client.
//!
//! Provides the error type, domain types, and the adapter traits that the
//! storage and session crates implement and consume.

pub mod error;
pub mod traits;
pub mod types;

pub use error::MyemteeError;
pub use types::{
    AdapterType, AuthResponse, AuthTokens, CodeDelivery, ConsumedFlags, ConsumedRepresentation,
    DayFeelings, Entry, HealthStatus, MfaChallenge, NewDeviceMetadata, SignUpResult, UserInfo,
    WireEntry,
};

pub use traits::{IdentityProvider, KeyValueStore, PluginAdapter};
