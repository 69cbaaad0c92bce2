// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle: sign-in, MFA, silent refresh and sign-out.

use std::sync::Arc;

use secrecy::SecretString;
use strum::Display;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use myemtee_core::{
    AuthResponse, AuthTokens, CodeDelivery, IdentityProvider, KeyValueStore, MfaChallenge,
    MyemteeError, NewDeviceMetadata, SignUpResult, UserInfo,
};
use myemtee_storage::CredentialKey;

use crate::jwt;

/// Externally visible session state. Refreshes happen inside `SignedIn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    SignedOut,
    Authenticating,
    MfaPending,
    SignedIn,
}

/// Result of a password sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// Tokens are stored. `new_device` is set when the provider started
    /// tracking this device, so the caller may offer to remember it.
    SignedIn {
        new_device: Option<NewDeviceMetadata>,
    },
    /// A one-time code is needed; pass the challenge to [`SessionManager::verify_mfa`].
    MfaRequired(MfaChallenge),
}

#[derive(Debug, Clone, Copy)]
enum TokenKind {
    Access,
    Id,
}

impl TokenKind {
    fn key(self) -> CredentialKey {
        match self {
            Self::Access => CredentialKey::AccessToken,
            Self::Id => CredentialKey::IdToken,
        }
    }
}

/// Owns the token set and device trust state for one client.
pub struct SessionManager {
    pub(crate) provider: Arc<dyn IdentityProvider>,
    pub(crate) store: Arc<dyn KeyValueStore>,
    state: RwLock<SessionState>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            provider,
            store,
            state: RwLock::new(SessionState::SignedOut),
        }
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    async fn set_state(&self, next: SessionState) {
        let mut state = self.state.write().await;
        let prev = *state;
        if prev != next {
            debug!(from = %prev, to = %next, "session state change");
            *state = next;
        }
    }

    // --- Store helpers ---

    pub(crate) async fn read(&self, key: &CredentialKey) -> Result<Option<String>, MyemteeError> {
        self.store.get(&key.to_string()).await
    }

    pub(crate) async fn write(&self, key: &CredentialKey, value: &str) -> Result<(), MyemteeError> {
        self.store.set(&key.to_string(), value).await
    }

    pub(crate) async fn delete(&self, key: &CredentialKey) -> Result<(), MyemteeError> {
        self.store.remove(&key.to_string()).await
    }

    async fn store_tokens(&self, tokens: &AuthTokens) -> Result<(), MyemteeError> {
        self.write(&CredentialKey::AccessToken, &tokens.access_token)
            .await?;
        self.write(&CredentialKey::IdToken, &tokens.id_token).await?;
        if let Some(refresh) = &tokens.refresh_token {
            self.write(&CredentialKey::RefreshToken, refresh).await?;
        }
        Ok(())
    }

    /// Remove every session credential and derived cache, attempting all keys
    /// even when some removals fail. Device trust flags are kept.
    async fn clear_session(&self) -> Result<(), MyemteeError> {
        let mut first_err = None;
        for key in CredentialKey::SESSION
            .into_iter()
            .chain([CredentialKey::TempUsername, CredentialKey::HistoryCache])
        {
            if let Err(e) = self.delete(&key).await {
                warn!(key = %key, error = %e, "failed to clear stored credential");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Persist a completed authentication and move to `SignedIn`.
    async fn complete_sign_in(&self, tokens: &AuthTokens) -> Result<(), MyemteeError> {
        self.store_tokens(tokens).await?;
        if let Err(e) = self.fetch_user_info(&tokens.access_token).await {
            warn!(error = %e, "signed in but could not load profile claims");
        }
        for key in [CredentialKey::TempUsername, CredentialKey::HistoryCache] {
            if let Err(e) = self.delete(&key).await {
                warn!(key = %key, error = %e, "signed in but could not clear stale entry");
            }
        }
        self.set_state(SessionState::SignedIn).await;
        Ok(())
    }

    // --- Authentication ---

    /// Password sign-in, presenting the stored device key for `username` if any.
    pub async fn sign_in(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<SignInOutcome, MyemteeError> {
        self.set_state(SessionState::Authenticating).await;
        match self.sign_in_inner(username, password).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.set_state(SessionState::SignedOut).await;
                Err(e)
            }
        }
    }

    async fn sign_in_inner(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<SignInOutcome, MyemteeError> {
        let device_key = self
            .read(&CredentialKey::DeviceKey(username.to_string()))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "could not read stored device key, signing in without it");
                None
            });

        let response = match self
            .provider
            .initiate_auth(username, password, device_key.as_deref())
            .await
        {
            // Remembered-device verification needs a device SRP exchange; fall
            // back to a plain password exchange and let MFA run normally.
            Err(MyemteeError::UnsupportedChallenge(challenge))
                if device_key.is_some() && challenge.starts_with("DEVICE_") =>
            {
                warn!(challenge = %challenge, "device challenge not supported, retrying without device key");
                self.provider.initiate_auth(username, password, None).await?
            }
            other => other?,
        };

        match response {
            AuthResponse::Authenticated { tokens, new_device } => {
                self.complete_sign_in(&tokens).await?;
                info!(username, "signed in");
                Ok(SignInOutcome::SignedIn { new_device })
            }
            AuthResponse::MfaRequired(challenge) => {
                self.write(&CredentialKey::TempUsername, username).await?;
                self.set_state(SessionState::MfaPending).await;
                info!(username, challenge = %challenge.challenge_name, "MFA code required");
                Ok(SignInOutcome::MfaRequired(challenge))
            }
        }
    }

    /// Answer an MFA challenge. On any failure the session stays `MfaPending`
    /// so the caller can retry with another code.
    ///
    /// Returns new-device metadata when the provider started tracking this device.
    pub async fn verify_mfa(
        &self,
        challenge: &MfaChallenge,
        code: &str,
    ) -> Result<Option<NewDeviceMetadata>, MyemteeError> {
        let code = code.trim();
        if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MyemteeError::Validation(
                "MFA code must be exactly 6 digits".to_string(),
            ));
        }

        match self.provider.respond_to_mfa(challenge, code).await? {
            AuthResponse::Authenticated { tokens, new_device } => {
                self.complete_sign_in(&tokens).await?;
                info!(username = %challenge.username, "MFA verified, signed in");
                Ok(new_device)
            }
            AuthResponse::MfaRequired(next) => Err(MyemteeError::UnsupportedChallenge(
                next.challenge_name,
            )),
        }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
        name: &str,
    ) -> Result<SignUpResult, MyemteeError> {
        let result = self.provider.sign_up(email, password, name).await?;
        info!(confirmed = result.confirmed, "account created");
        Ok(result)
    }

    pub async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), MyemteeError> {
        self.provider.confirm_sign_up(username, code.trim()).await
    }

    pub async fn forgot_password(
        &self,
        username: &str,
    ) -> Result<Option<CodeDelivery>, MyemteeError> {
        self.provider.forgot_password(username).await
    }

    pub async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &SecretString,
    ) -> Result<(), MyemteeError> {
        self.provider
            .confirm_forgot_password(username, code.trim(), new_password)
            .await
    }

    // --- Tokens ---

    /// A live access token, refreshing silently when the stored one expired.
    /// `None` means "not authenticated".
    pub async fn access_token(&self) -> Option<String> {
        self.ensure_fresh(TokenKind::Access).await
    }

    /// A live identity token, refreshing silently when the stored one expired.
    pub async fn id_token(&self) -> Option<String> {
        self.ensure_fresh(TokenKind::Id).await
    }

    async fn ensure_fresh(&self, kind: TokenKind) -> Option<String> {
        let key = kind.key();
        let token = match self.read(&key).await {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "could not read stored token");
                return None;
            }
        };
        if !jwt::is_expired(&token, jwt::now()) {
            return Some(token);
        }

        debug!(?kind, "stored token expired, refreshing");
        if let Err(e) = self.refresh_session().await {
            debug!(error = %e, "silent refresh failed");
            return None;
        }
        match self.read(&key).await {
            Ok(Some(token)) if !jwt::is_expired(&token, jwt::now()) => Some(token),
            _ => None,
        }
    }

    /// Exchange the stored refresh token for a new token set.
    ///
    /// A rejected refresh token wipes every stored credential and signs out.
    /// Any other failure leaves stored tokens untouched so a later retry can
    /// succeed.
    pub async fn refresh_session(&self) -> Result<(), MyemteeError> {
        let Some(refresh_token) = self.read(&CredentialKey::RefreshToken).await? else {
            return Err(MyemteeError::NotAuthenticated);
        };

        match self.provider.refresh(&refresh_token).await {
            Ok(mut tokens) => {
                tokens.refresh_token.get_or_insert(refresh_token);
                self.store_tokens(&tokens).await?;
                debug!("session refreshed");
                Ok(())
            }
            Err(e) if e.is_credential_rejected() => {
                warn!(error = %e, "refresh token rejected, clearing session");
                if let Err(clear_err) = self.clear_session().await {
                    warn!(error = %clear_err, "session only partially cleared");
                }
                self.set_state(SessionState::SignedOut).await;
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, keeping stored credentials");
                Err(e)
            }
        }
    }

    /// Whether a stored access token exists and has not expired. Never refreshes.
    pub async fn is_authenticated(&self) -> bool {
        match self.read(&CredentialKey::AccessToken).await {
            Ok(Some(token)) => !jwt::is_expired(&token, jwt::now()),
            _ => false,
        }
    }

    /// Restore `SignedIn` after a restart when the stored session is usable.
    pub async fn resume(&self) -> bool {
        let live = self.access_token().await.is_some();
        if live {
            self.set_state(SessionState::SignedIn).await;
        }
        live
    }

    // --- Profile ---

    async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo, MyemteeError> {
        let info = self.provider.get_user(access_token).await?;
        let json = serde_json::to_string(&info)
            .map_err(|e| MyemteeError::Internal(format!("failed to encode profile: {e}")))?;
        self.write(&CredentialKey::UserInfo, &json).await?;
        Ok(info)
    }

    /// Cached profile claims of the signed-in user, fetched if not cached.
    /// `None` when not authenticated.
    pub async fn current_user(&self) -> Result<Option<UserInfo>, MyemteeError> {
        let Some(access_token) = self.access_token().await else {
            return Ok(None);
        };
        if let Some(json) = self.read(&CredentialKey::UserInfo).await? {
            match serde_json::from_str(&json) {
                Ok(info) => return Ok(Some(info)),
                Err(e) => warn!(error = %e, "cached profile unreadable, fetching again"),
            }
        }
        self.fetch_user_info(&access_token).await.map(Some)
    }

    /// Re-fetch profile claims from the provider.
    pub async fn refresh_user_info(&self) -> Result<UserInfo, MyemteeError> {
        let access_token = self
            .access_token()
            .await
            .ok_or(MyemteeError::NotAuthenticated)?;
        self.fetch_user_info(&access_token).await
    }

    /// The stable identity claim (`sub`) that keys entry encryption.
    pub async fn user_identity(&self) -> Option<String> {
        if let Some(id_token) = self.id_token().await
            && let Ok(jwt::Claims { sub: Some(sub), .. }) = jwt::decode_claims(&id_token)
        {
            return Some(sub);
        }
        let json = self.read(&CredentialKey::UserInfo).await.ok().flatten()?;
        serde_json::from_str::<UserInfo>(&json).ok()?.sub
    }

    // --- Sign-out ---

    /// Revoke the session remotely (best effort) and wipe local credentials.
    pub async fn sign_out(&self) -> Result<(), MyemteeError> {
        match self.read(&CredentialKey::AccessToken).await {
            Ok(Some(access_token)) => {
                if let Err(e) = self.provider.global_sign_out(&access_token).await {
                    warn!(error = %e, "remote sign-out failed, clearing local session anyway");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not read access token for remote sign-out"),
        }

        let cleared = self.clear_session().await;
        self.set_state(SessionState::SignedOut).await;
        info!("signed out");
        cleared
    }
}
