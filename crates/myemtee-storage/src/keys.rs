// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logical key layout of the credential store.

use std::fmt;

/// Every key the client persists. Device trust keys are namespaced by
/// username because they are read before authentication completes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    AccessToken,
    IdToken,
    RefreshToken,
    /// Cached profile claims (JSON).
    UserInfo,
    DeviceKey(String),
    DeviceGroupKey(String),
    DeviceRemembered(String),
    NeverRememberDevice(String),
    /// Username held between a password exchange and its MFA completion.
    TempUsername,
    /// Per-month calendar averages (JSON).
    HistoryCache,
}

impl CredentialKey {
    /// Keys wiped on sign-out and on a rejected refresh token.
    pub const SESSION: [CredentialKey; 4] = [
        CredentialKey::AccessToken,
        CredentialKey::IdToken,
        CredentialKey::RefreshToken,
        CredentialKey::UserInfo,
    ];
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessToken => f.write_str("access_token"),
            Self::IdToken => f.write_str("id_token"),
            Self::RefreshToken => f.write_str("refresh_token"),
            Self::UserInfo => f.write_str("user_info"),
            Self::DeviceKey(user) => write!(f, "device_key:{user}"),
            Self::DeviceGroupKey(user) => write!(f, "device_group_key:{user}"),
            Self::DeviceRemembered(user) => write!(f, "device_remembered:{user}"),
            Self::NeverRememberDevice(user) => write!(f, "never_remember_device:{user}"),
            Self::TempUsername => f.write_str("temp_username"),
            Self::HistoryCache => f.write_str("history_cache"),
        }
    }
}
