// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock identity provider for deterministic session tests.
//!
//! Password and MFA exchanges pop scripted responses from one FIFO queue,
//! refreshes from another. Every call is recorded so tests can assert on
//! what reached the provider.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::Mutex;

use myemtee_core::{
    AdapterType, AuthResponse, AuthTokens, CodeDelivery, HealthStatus, IdentityProvider,
    MfaChallenge, MyemteeError, NewDeviceMetadata, PluginAdapter, SignUpResult, UserInfo,
};

/// One recorded provider call. Secrets are not recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    InitiateAuth {
        username: String,
        device_key: Option<String>,
    },
    RespondToMfa {
        username: String,
        code: String,
    },
    Refresh {
        refresh_token: String,
    },
    SignUp {
        email: String,
        name: String,
    },
    ConfirmSignUp {
        username: String,
        code: String,
    },
    ForgotPassword {
        username: String,
    },
    ConfirmForgotPassword {
        username: String,
        code: String,
    },
    GlobalSignOut,
    GetUser,
    ConfirmDevice {
        device_key: String,
        device_name: String,
    },
    UpdateDeviceStatus {
        device_key: String,
        remembered: bool,
    },
}

/// Scripted identity provider.
///
/// With nothing scripted, password and MFA exchanges fail with
/// `NotAuthorized` and refreshes fail with a transient provider error.
pub struct MockIdentityProvider {
    auth: Mutex<VecDeque<Result<AuthResponse, MyemteeError>>>,
    refresh: Mutex<VecDeque<Result<AuthTokens, MyemteeError>>>,
    user: Mutex<UserInfo>,
    calls: Mutex<Vec<ProviderCall>>,
    fail_sign_out: AtomicBool,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self {
            auth: Mutex::new(VecDeque::new()),
            refresh: Mutex::new(VecDeque::new()),
            user: Mutex::new(UserInfo {
                username: "mock-user".into(),
                sub: Some("mock-sub".into()),
                email: Some("mock@example.com".into()),
                email_verified: true,
                ..Default::default()
            }),
            calls: Mutex::new(Vec::new()),
            fail_sign_out: AtomicBool::new(false),
        }
    }

    /// Queue the result of the next password or MFA exchange.
    pub async fn push_auth(&self, response: Result<AuthResponse, MyemteeError>) {
        self.auth.lock().await.push_back(response);
    }

    /// Queue the result of the next refresh.
    pub async fn push_refresh(&self, response: Result<AuthTokens, MyemteeError>) {
        self.refresh.lock().await.push_back(response);
    }

    /// Profile returned by `get_user`.
    pub async fn set_user(&self, user: UserInfo) {
        *self.user.lock().await = user;
    }

    /// Make `global_sign_out` fail with a transport-style error.
    pub fn fail_global_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    /// Every call received so far, in order.
    pub async fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: ProviderCall) {
        self.calls.lock().await.push(call);
    }

    async fn next_auth(&self) -> Result<AuthResponse, MyemteeError> {
        self.auth
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(MyemteeError::NotAuthorized("no scripted response".into())))
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockIdentityProvider {
    fn name(&self) -> &str {
        "mock-identity"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::IdentityProvider
    }

    async fn health_check(&self) -> Result<HealthStatus, MyemteeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MyemteeError> {
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn initiate_auth(
        &self,
        username: &str,
        _password: &SecretString,
        device_key: Option<&str>,
    ) -> Result<AuthResponse, MyemteeError> {
        self.record(ProviderCall::InitiateAuth {
            username: username.into(),
            device_key: device_key.map(str::to_string),
        })
        .await;
        self.next_auth().await
    }

    async fn respond_to_mfa(
        &self,
        challenge: &MfaChallenge,
        code: &str,
    ) -> Result<AuthResponse, MyemteeError> {
        self.record(ProviderCall::RespondToMfa {
            username: challenge.username.clone(),
            code: code.into(),
        })
        .await;
        self.next_auth().await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, MyemteeError> {
        self.record(ProviderCall::Refresh {
            refresh_token: refresh_token.into(),
        })
        .await;
        self.refresh
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(MyemteeError::provider(None, "no scripted refresh")))
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &SecretString,
        name: &str,
    ) -> Result<SignUpResult, MyemteeError> {
        self.record(ProviderCall::SignUp {
            email: email.into(),
            name: name.into(),
        })
        .await;
        Ok(SignUpResult {
            user_sub: format!("sub-{email}"),
            confirmed: false,
            code_delivery: Some(CodeDelivery {
                destination: Some(email.into()),
                medium: Some("EMAIL".into()),
            }),
        })
    }

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), MyemteeError> {
        self.record(ProviderCall::ConfirmSignUp {
            username: username.into(),
            code: code.into(),
        })
        .await;
        Ok(())
    }

    async fn forgot_password(&self, username: &str) -> Result<Option<CodeDelivery>, MyemteeError> {
        self.record(ProviderCall::ForgotPassword {
            username: username.into(),
        })
        .await;
        Ok(Some(CodeDelivery {
            destination: Some(username.into()),
            medium: Some("EMAIL".into()),
        }))
    }

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        _new_password: &SecretString,
    ) -> Result<(), MyemteeError> {
        self.record(ProviderCall::ConfirmForgotPassword {
            username: username.into(),
            code: code.into(),
        })
        .await;
        Ok(())
    }

    async fn global_sign_out(&self, _access_token: &str) -> Result<(), MyemteeError> {
        self.record(ProviderCall::GlobalSignOut).await;
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(MyemteeError::provider(None, "HTTP request failed: connection reset"));
        }
        Ok(())
    }

    async fn get_user(&self, _access_token: &str) -> Result<UserInfo, MyemteeError> {
        self.record(ProviderCall::GetUser).await;
        Ok(self.user.lock().await.clone())
    }

    async fn confirm_device(
        &self,
        _access_token: &str,
        device: &NewDeviceMetadata,
        device_name: &str,
    ) -> Result<(), MyemteeError> {
        self.record(ProviderCall::ConfirmDevice {
            device_key: device.device_key.clone(),
            device_name: device_name.into(),
        })
        .await;
        Ok(())
    }

    async fn update_device_status(
        &self,
        _access_token: &str,
        device_key: &str,
        remembered: bool,
    ) -> Result<(), MyemteeError> {
        self.record(ProviderCall::UpdateDeviceStatus {
            device_key: device_key.into(),
            remembered,
        })
        .await;
        Ok(())
    }
}
