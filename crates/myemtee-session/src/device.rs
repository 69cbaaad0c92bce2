// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device trust: remembering this device so later sign-ins can skip MFA.
//!
//! All flags are keyed by username because they must be readable before
//! authentication completes.

use tracing::{info, warn};

use myemtee_core::{MyemteeError, NewDeviceMetadata};
use myemtee_storage::CredentialKey;

use crate::manager::SessionManager;

/// Locally persisted trust state for one username.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceTrustRecord {
    pub device_key: Option<String>,
    pub device_group_key: Option<String>,
    pub remembered: bool,
    /// The user asked not to be prompted to remember this device again.
    pub never_remember: bool,
}

impl SessionManager {
    async fn flag(&self, key: CredentialKey) -> Result<bool, MyemteeError> {
        Ok(self.read(&key).await?.as_deref() == Some("true"))
    }

    async fn set_flag(&self, key: CredentialKey, value: bool) -> Result<(), MyemteeError> {
        if value {
            self.write(&key, "true").await
        } else {
            self.delete(&key).await
        }
    }

    pub async fn device_trust(&self, username: &str) -> Result<DeviceTrustRecord, MyemteeError> {
        let user = username.to_string();
        Ok(DeviceTrustRecord {
            device_key: self.read(&CredentialKey::DeviceKey(user.clone())).await?,
            device_group_key: self
                .read(&CredentialKey::DeviceGroupKey(user.clone()))
                .await?,
            remembered: self.flag(CredentialKey::DeviceRemembered(user.clone())).await?,
            never_remember: self.flag(CredentialKey::NeverRememberDevice(user)).await?,
        })
    }

    pub async fn is_device_remembered(&self, username: &str) -> Result<bool, MyemteeError> {
        self.flag(CredentialKey::DeviceRemembered(username.to_string()))
            .await
    }

    pub async fn set_device_remembered(
        &self,
        username: &str,
        remembered: bool,
    ) -> Result<(), MyemteeError> {
        self.set_flag(CredentialKey::DeviceRemembered(username.to_string()), remembered)
            .await
    }

    pub async fn is_never_remember(&self, username: &str) -> Result<bool, MyemteeError> {
        self.flag(CredentialKey::NeverRememberDevice(username.to_string()))
            .await
    }

    /// Opt out of (or, with `false`, back into) remember-device prompts.
    pub async fn set_never_remember(&self, username: &str, never: bool) -> Result<(), MyemteeError> {
        self.set_flag(CredentialKey::NeverRememberDevice(username.to_string()), never)
            .await
    }

    /// Whether to ask the user to remember this device after a sign-in that
    /// produced `new_device`.
    pub async fn should_offer_remember(
        &self,
        username: &str,
        new_device: Option<&NewDeviceMetadata>,
    ) -> Result<bool, MyemteeError> {
        if new_device.is_none() {
            return Ok(false);
        }
        let trust = self.device_trust(username).await?;
        Ok(!trust.remembered && !trust.never_remember)
    }

    /// Confirm `device` with the provider, mark it remembered, and persist its keys.
    pub async fn confirm_device_and_remember(
        &self,
        device: &NewDeviceMetadata,
        username: &str,
        device_name: &str,
    ) -> Result<(), MyemteeError> {
        if device.device_key.is_empty() || device.device_group_key.is_empty() {
            return Err(MyemteeError::Validation(
                "device key and device group key are both required".to_string(),
            ));
        }
        let access_token = self
            .access_token()
            .await
            .ok_or(MyemteeError::NotAuthenticated)?;

        self.provider
            .confirm_device(&access_token, device, device_name)
            .await?;
        self.provider
            .update_device_status(&access_token, &device.device_key, true)
            .await?;

        let user = username.to_string();
        self.write(&CredentialKey::DeviceKey(user.clone()), &device.device_key)
            .await?;
        self.write(
            &CredentialKey::DeviceGroupKey(user.clone()),
            &device.device_group_key,
        )
        .await?;
        self.set_flag(CredentialKey::DeviceRemembered(user), true)
            .await?;
        info!(username, device_name, "device remembered");
        Ok(())
    }

    /// Stop trusting this device for `username`.
    ///
    /// The provider is told when a live session exists; local state is
    /// cleared regardless.
    pub async fn forget_device(&self, username: &str) -> Result<(), MyemteeError> {
        let user = username.to_string();
        let device_key = self.read(&CredentialKey::DeviceKey(user.clone())).await?;

        if let Some(device_key) = &device_key
            && let Some(access_token) = self.access_token().await
            && let Err(e) = self
                .provider
                .update_device_status(&access_token, device_key, false)
                .await
        {
            warn!(error = %e, "could not mark device forgotten at the provider");
        }

        self.delete(&CredentialKey::DeviceKey(user.clone())).await?;
        self.delete(&CredentialKey::DeviceGroupKey(user.clone()))
            .await?;
        self.delete(&CredentialKey::DeviceRemembered(user)).await?;
        info!(username, "device forgotten");
        Ok(())
    }
}
