// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account and session commands: login, logout, profile, tokens, device trust.

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use secrecy::SecretString;
use tracing::{info, warn};

use myemtee_config::model::MyemteeConfig;
use myemtee_core::{IdentityProvider, KeyValueStore, MyemteeError, NewDeviceMetadata};
use myemtee_session::{CognitoIdentityProvider, SessionManager, SignInOutcome};
use myemtee_storage::{CredentialStore, HistoryCache};

use crate::prompt::{self, RememberChoice};

/// MFA codes accepted per login before giving up.
const MFA_ATTEMPTS: usize = 3;

/// Everything a command needs: configuration, credential store, session.
pub struct Client {
    pub config: MyemteeConfig,
    pub store: Arc<dyn KeyValueStore>,
    pub session: SessionManager,
}

impl Client {
    /// Wire the user-pool provider and the two-tier credential store from `config`.
    pub fn open(config: MyemteeConfig) -> Result<Self, MyemteeError> {
        let provider = Arc::new(CognitoIdentityProvider::new(&config.identity)?);
        let store = Arc::new(CredentialStore::new(config.storage.clone()));
        Ok(Self::from_parts(config, provider, store))
    }

    pub fn from_parts(
        config: MyemteeConfig,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let session = SessionManager::new(provider, store.clone());
        Self {
            config,
            store,
            session,
        }
    }

    pub fn history(&self) -> HistoryCache {
        HistoryCache::new(
            self.store.clone(),
            Duration::from_secs(self.config.storage.history_cache_ttl_secs),
        )
    }

    /// Flush and close the credential store.
    pub async fn close(&self) {
        if let Err(e) = self.store.shutdown().await {
            warn!(error = %e, "credential store did not shut down cleanly");
        }
    }
}

/// Sign in, answering MFA with codes from `next_code` and the remember-device
/// question with `remember`. Returns whether the device is now remembered.
pub async fn login_with<C, R>(
    client: &Client,
    username: &str,
    password: &SecretString,
    mut next_code: C,
    remember: R,
) -> Result<bool, MyemteeError>
where
    C: FnMut() -> Result<String, MyemteeError>,
    R: FnOnce() -> Result<RememberChoice, MyemteeError>,
{
    let new_device = match client.session.sign_in(username, password).await? {
        SignInOutcome::SignedIn { new_device } => new_device,
        SignInOutcome::MfaRequired(challenge) => {
            let mut attempt = 1;
            loop {
                let code = next_code()?;
                match client.session.verify_mfa(&challenge, &code).await {
                    Ok(new_device) => break new_device,
                    Err(e) if attempt < MFA_ATTEMPTS => {
                        eprintln!("{e}. Try again.");
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    };

    offer_remember(client, username, new_device.as_ref(), remember).await
}

async fn offer_remember<R>(
    client: &Client,
    username: &str,
    new_device: Option<&NewDeviceMetadata>,
    remember: R,
) -> Result<bool, MyemteeError>
where
    R: FnOnce() -> Result<RememberChoice, MyemteeError>,
{
    if !client
        .session
        .should_offer_remember(username, new_device)
        .await?
    {
        return Ok(false);
    }
    let Some(device) = new_device else {
        return Ok(false);
    };

    match remember()? {
        RememberChoice::Yes => {
            client
                .session
                .confirm_device_and_remember(device, username, &client.config.identity.device_name)
                .await?;
            Ok(true)
        }
        RememberChoice::Never => {
            client.session.set_never_remember(username, true).await?;
            Ok(false)
        }
        RememberChoice::No => Ok(false),
    }
}

pub async fn login(client: &Client, username: &str, remember: bool) -> Result<(), MyemteeError> {
    let password = prompt::password("Password: ")?;
    let remembered = login_with(
        client,
        username,
        &password,
        || prompt::line("MFA code: "),
        || {
            if remember {
                Ok(RememberChoice::Yes)
            } else {
                prompt::remember_device()
            }
        },
    )
    .await?;

    eprintln!("{} signed in as {username}", "✓".green());
    if remembered {
        eprintln!("  this device is remembered");
    }
    Ok(())
}

pub async fn logout(client: &Client) -> Result<(), MyemteeError> {
    client.session.sign_out().await?;
    eprintln!("signed out");
    Ok(())
}

pub async fn whoami(client: &Client, refresh: bool) -> Result<(), MyemteeError> {
    let user = if refresh {
        client.session.refresh_user_info().await?
    } else {
        client
            .session
            .current_user()
            .await?
            .ok_or(MyemteeError::NotAuthenticated)?
    };
    print_json(&user)
}

pub async fn token(client: &Client, id: bool) -> Result<(), MyemteeError> {
    let token = if id {
        client.session.id_token().await
    } else {
        client.session.access_token().await
    };
    println!("{}", token.ok_or(MyemteeError::NotAuthenticated)?);
    Ok(())
}

pub async fn signup(client: &Client, email: &str, name: &str) -> Result<(), MyemteeError> {
    let password = prompt::new_password()?;
    let result = client.session.sign_up(email, &password, name).await?;
    if let Some(delivery) = &result.code_delivery {
        eprintln!(
            "confirmation code sent via {} to {}",
            delivery.medium.as_deref().unwrap_or("unknown medium"),
            delivery.destination.as_deref().unwrap_or("your account"),
        );
    }
    println!("{}", result.user_sub);
    Ok(())
}

pub async fn confirm_signup(client: &Client, username: &str, code: &str) -> Result<(), MyemteeError> {
    client.session.confirm_sign_up(username, code).await?;
    eprintln!("account confirmed, you can now log in");
    Ok(())
}

pub async fn forgot_password(client: &Client, username: &str) -> Result<(), MyemteeError> {
    match client.session.forgot_password(username).await? {
        Some(delivery) => eprintln!(
            "reset code sent to {}",
            delivery.destination.as_deref().unwrap_or("your account")
        ),
        None => eprintln!("reset code requested"),
    }
    Ok(())
}

pub async fn reset_password(client: &Client, username: &str, code: &str) -> Result<(), MyemteeError> {
    let password = prompt::new_password()?;
    client
        .session
        .confirm_forgot_password(username, code, &password)
        .await?;
    eprintln!("password changed");
    Ok(())
}

/// Show device trust for `username`, optionally changing the remember-device
/// prompt preference.
pub async fn remember_device(
    client: &Client,
    username: &str,
    never: Option<bool>,
) -> Result<(), MyemteeError> {
    if let Some(never) = never {
        client.session.set_never_remember(username, never).await?;
        info!(username, never, "remember-device preference updated");
    }
    let trust = client.session.device_trust(username).await?;
    print_json(&serde_json::json!({
        "username": username,
        "remembered": trust.remembered,
        "neverRemember": trust.never_remember,
        "deviceKey": trust.device_key,
    }))
}

pub async fn forget_device(client: &Client, username: &str) -> Result<(), MyemteeError> {
    client.session.forget_device(username).await?;
    eprintln!("device forgotten, MFA will be required at next login");
    Ok(())
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), MyemteeError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| MyemteeError::Internal(format!("failed to encode output: {e}")))?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use myemtee_core::{AuthResponse, MfaChallenge};
    use myemtee_test_utils::tokens::token_set;
    use myemtee_test_utils::{MemoryStore, MockIdentityProvider, ProviderCall};

    fn client() -> (Arc<MockIdentityProvider>, Arc<MemoryStore>, Client) {
        let provider = Arc::new(MockIdentityProvider::new());
        let store = Arc::new(MemoryStore::new());
        let client = Client::from_parts(MyemteeConfig::default(), provider.clone(), store.clone());
        (provider, store, client)
    }

    fn device() -> NewDeviceMetadata {
        NewDeviceMetadata {
            device_key: "dk".into(),
            device_group_key: "dgk".into(),
        }
    }

    fn challenge() -> MfaChallenge {
        MfaChallenge {
            username: "alice".into(),
            challenge_name: "SOFTWARE_TOKEN_MFA".into(),
            session: "s".into(),
        }
    }

    #[tokio::test]
    async fn login_retries_bad_codes_then_remembers_device() {
        let (provider, store, client) = client();
        provider
            .push_auth(Ok(AuthResponse::MfaRequired(challenge())))
            .await;
        provider
            .push_auth(Ok(AuthResponse::Authenticated {
                tokens: token_set("user-abc", Some("r")),
                new_device: Some(device()),
            }))
            .await;

        let mut codes = vec!["123456".to_string(), "12".to_string()];
        let remembered = login_with(
            &client,
            "alice",
            &SecretString::from("pw"),
            move || Ok(codes.pop().unwrap_or_default()),
            || Ok(RememberChoice::Yes),
        )
        .await
        .unwrap();

        assert!(remembered);
        assert!(store.contains("device_remembered:alice").await);
        assert!(provider.calls().await.contains(&ProviderCall::ConfirmDevice {
            device_key: "dk".into(),
            device_name: "myemtee-cli".into(),
        }));
    }

    #[tokio::test]
    async fn login_gives_up_after_three_bad_codes() {
        let (provider, _store, client) = client();
        provider
            .push_auth(Ok(AuthResponse::MfaRequired(challenge())))
            .await;

        let err = login_with(
            &client,
            "alice",
            &SecretString::from("pw"),
            || Ok("abc".to_string()),
            || Ok(RememberChoice::No),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MyemteeError::Validation(_)));
    }

    #[tokio::test]
    async fn declining_with_never_suppresses_future_offers() {
        let (provider, _store, client) = client();
        provider
            .push_auth(Ok(AuthResponse::Authenticated {
                tokens: token_set("user-abc", Some("r")),
                new_device: Some(device()),
            }))
            .await;

        let remembered = login_with(
            &client,
            "alice",
            &SecretString::from("pw"),
            || Ok(String::new()),
            || Ok(RememberChoice::Never),
        )
        .await
        .unwrap();

        assert!(!remembered);
        assert!(client.session.is_never_remember("alice").await.unwrap());
        assert!(
            !client
                .session
                .should_offer_remember("alice", Some(&device()))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn no_offer_without_new_device() {
        let (provider, _store, client) = client();
        provider
            .push_auth(Ok(AuthResponse::Authenticated {
                tokens: token_set("user-abc", Some("r")),
                new_device: None,
            }))
            .await;

        let remembered = login_with(
            &client,
            "alice",
            &SecretString::from("pw"),
            || Ok(String::new()),
            || panic!("should not ask"),
        )
        .await
        .unwrap();
        assert!(!remembered);
    }
}
