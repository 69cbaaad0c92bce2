// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication and session management for the Myemtee client.
//!
//! [`SessionManager`] drives sign-in (with MFA), silent token refresh,
//! sign-out and device trust on top of any [`IdentityProvider`] and
//! [`KeyValueStore`]. [`CognitoIdentityProvider`] is the HTTP implementation
//! for a Cognito-compatible user pool.
//!
//! [`IdentityProvider`]: myemtee_core::IdentityProvider
//! [`KeyValueStore`]: myemtee_core::KeyValueStore

pub mod cognito;
pub mod device;
pub mod jwt;
pub mod manager;
mod wire;

pub use cognito::CognitoIdentityProvider;
pub use device::DeviceTrustRecord;
pub use manager::{SessionManager, SessionState, SignInOutcome};
