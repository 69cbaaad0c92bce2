// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity provider trait: the remote user directory that issues tokens.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::MyemteeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    AuthResponse, AuthTokens, CodeDelivery, MfaChallenge, NewDeviceMetadata, SignUpResult,
    UserInfo,
};

/// Remote identity provider.
///
/// Implementations report rejected credentials as
/// [`MyemteeError::NotAuthorized`] and every other failure (transport,
/// throttling, invalid code) as [`MyemteeError::Provider`].
#[async_trait]
pub trait IdentityProvider: PluginAdapter {
    /// Password authentication. `device_key` is presented when this device was
    /// remembered earlier, letting the provider skip the MFA challenge.
    async fn initiate_auth(
        &self,
        username: &str,
        password: &SecretString,
        device_key: Option<&str>,
    ) -> Result<AuthResponse, MyemteeError>;

    /// Answers an MFA challenge with the user's one-time code.
    async fn respond_to_mfa(
        &self,
        challenge: &MfaChallenge,
        code: &str,
    ) -> Result<AuthResponse, MyemteeError>;

    /// Exchanges a refresh token for fresh access and identity tokens.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, MyemteeError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
        name: &str,
    ) -> Result<SignUpResult, MyemteeError>;

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), MyemteeError>;

    async fn forgot_password(&self, username: &str) -> Result<Option<CodeDelivery>, MyemteeError>;

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &SecretString,
    ) -> Result<(), MyemteeError>;

    /// Revokes every token issued for the session behind `access_token`.
    async fn global_sign_out(&self, access_token: &str) -> Result<(), MyemteeError>;

    async fn get_user(&self, access_token: &str) -> Result<UserInfo, MyemteeError>;

    async fn confirm_device(
        &self,
        access_token: &str,
        device: &NewDeviceMetadata,
        device_name: &str,
    ) -> Result<(), MyemteeError>;

    async fn update_device_status(
        &self,
        access_token: &str,
        device_key: &str,
        remembered: bool,
    ) -> Result<(), MyemteeError>;
}
