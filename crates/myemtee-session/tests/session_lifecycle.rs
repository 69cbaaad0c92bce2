// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sign-in, MFA, refresh and sign-out against a scripted provider.

use std::sync::Arc;

use myemtee_core::{AuthResponse, KeyValueStore, MfaChallenge, MyemteeError, NewDeviceMetadata};
use myemtee_session::{SessionManager, SessionState, SignInOutcome};
use myemtee_test_utils::tokens::{expired_token, live_token, token_set};
use myemtee_test_utils::{MemoryStore, MockIdentityProvider, ProviderCall};
use secrecy::SecretString;

const TOKEN_KEYS: [&str; 3] = ["access_token", "id_token", "refresh_token"];

fn setup() -> (Arc<MockIdentityProvider>, Arc<MemoryStore>, SessionManager) {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(MemoryStore::new());
    let manager = SessionManager::new(provider.clone(), store.clone());
    (provider, store, manager)
}

fn challenge() -> MfaChallenge {
    MfaChallenge {
        username: "alice@example.com".into(),
        challenge_name: "SOFTWARE_TOKEN_MFA".into(),
        session: "opaque".into(),
    }
}

fn password() -> SecretString {
    SecretString::from("correct horse")
}

async fn seed_expired_session(store: &MemoryStore) {
    store.set("access_token", &expired_token("user-abc")).await.unwrap();
    store.set("id_token", &expired_token("user-abc")).await.unwrap();
    store.set("refresh_token", "refresh-1").await.unwrap();
}

#[tokio::test]
async fn mfa_sign_in_persists_nothing_until_code_is_verified() {
    let (provider, store, manager) = setup();
    provider
        .push_auth(Ok(AuthResponse::MfaRequired(challenge())))
        .await;
    provider
        .push_auth(Ok(AuthResponse::Authenticated {
            tokens: token_set("user-abc", Some("refresh-1")),
            new_device: None,
        }))
        .await;

    let outcome = manager.sign_in("alice@example.com", &password()).await.unwrap();
    let pending = match outcome {
        SignInOutcome::MfaRequired(c) => c,
        other => panic!("expected MFA challenge, got {other:?}"),
    };
    assert_eq!(pending.session, "opaque");
    assert_eq!(manager.state().await, SessionState::MfaPending);
    for key in TOKEN_KEYS {
        assert!(!store.contains(key).await, "{key} persisted before MFA");
    }
    assert!(store.contains("temp_username").await);

    let new_device = manager.verify_mfa(&pending, "123456").await.unwrap();
    assert_eq!(new_device, None);
    assert_eq!(manager.state().await, SessionState::SignedIn);
    for key in TOKEN_KEYS {
        assert!(store.contains(key).await, "{key} missing after MFA");
    }
    assert!(!store.contains("temp_username").await);
    assert!(store.contains("user_info").await);
}

#[tokio::test]
async fn malformed_mfa_code_is_rejected_locally() {
    let (provider, _store, manager) = setup();
    provider
        .push_auth(Ok(AuthResponse::MfaRequired(challenge())))
        .await;
    manager.sign_in("alice@example.com", &password()).await.unwrap();

    for code in ["12345", "1234567", "12a456", ""] {
        let err = manager.verify_mfa(&challenge(), code).await.unwrap_err();
        assert!(matches!(err, MyemteeError::Validation(_)), "code {code:?}");
    }
    assert_eq!(manager.state().await, SessionState::MfaPending);
    assert!(!provider
        .calls()
        .await
        .iter()
        .any(|c| matches!(c, ProviderCall::RespondToMfa { .. })));
}

#[tokio::test]
async fn wrong_mfa_code_stays_pending_and_allows_retry() {
    let (provider, store, manager) = setup();
    provider
        .push_auth(Ok(AuthResponse::MfaRequired(challenge())))
        .await;
    provider
        .push_auth(Err(MyemteeError::provider(
            Some("CodeMismatchException".into()),
            "Invalid code received for user",
        )))
        .await;
    provider
        .push_auth(Ok(AuthResponse::Authenticated {
            tokens: token_set("user-abc", Some("refresh-1")),
            new_device: None,
        }))
        .await;

    manager.sign_in("alice@example.com", &password()).await.unwrap();
    assert!(manager.verify_mfa(&challenge(), "000000").await.is_err());
    assert_eq!(manager.state().await, SessionState::MfaPending);
    assert!(store.contains("temp_username").await);

    manager.verify_mfa(&challenge(), "654321").await.unwrap();
    assert_eq!(manager.state().await, SessionState::SignedIn);
}

#[tokio::test]
async fn direct_sign_in_caches_profile_and_clears_history() {
    let (provider, store, manager) = setup();
    store.set("history_cache", "{}").await.unwrap();
    let device = NewDeviceMetadata {
        device_key: "dk-new".into(),
        device_group_key: "dgk".into(),
    };
    provider
        .push_auth(Ok(AuthResponse::Authenticated {
            tokens: token_set("user-abc", Some("refresh-1")),
            new_device: Some(device.clone()),
        }))
        .await;

    let outcome = manager.sign_in("alice@example.com", &password()).await.unwrap();
    assert_eq!(
        outcome,
        SignInOutcome::SignedIn {
            new_device: Some(device)
        }
    );
    assert!(!store.contains("history_cache").await);
    let user = manager.current_user().await.unwrap().unwrap();
    assert_eq!(user.sub.as_deref(), Some("mock-sub"));
    assert!(manager.is_authenticated().await);
}

#[tokio::test]
async fn rejected_password_returns_to_signed_out() {
    let (_provider, store, manager) = setup();
    let err = manager
        .sign_in("alice@example.com", &password())
        .await
        .unwrap_err();
    assert!(matches!(err, MyemteeError::NotAuthorized(_)));
    assert_eq!(manager.state().await, SessionState::SignedOut);
    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn stored_device_key_is_presented() {
    let (provider, store, manager) = setup();
    store
        .set("device_key:alice@example.com", "dk-1")
        .await
        .unwrap();
    provider
        .push_auth(Ok(AuthResponse::Authenticated {
            tokens: token_set("user-abc", Some("r")),
            new_device: None,
        }))
        .await;

    manager.sign_in("alice@example.com", &password()).await.unwrap();
    assert_eq!(
        provider.calls().await[0],
        ProviderCall::InitiateAuth {
            username: "alice@example.com".into(),
            device_key: Some("dk-1".into()),
        }
    );
}

#[tokio::test]
async fn device_challenge_falls_back_to_plain_password_exchange() {
    let (provider, store, manager) = setup();
    store
        .set("device_key:alice@example.com", "dk-1")
        .await
        .unwrap();
    provider
        .push_auth(Err(MyemteeError::UnsupportedChallenge("DEVICE_SRP_AUTH".into())))
        .await;
    provider
        .push_auth(Ok(AuthResponse::MfaRequired(challenge())))
        .await;

    let outcome = manager.sign_in("alice@example.com", &password()).await.unwrap();
    assert!(matches!(outcome, SignInOutcome::MfaRequired(_)));

    let calls = provider.calls().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1],
        ProviderCall::InitiateAuth {
            username: "alice@example.com".into(),
            device_key: None,
        }
    );
}

#[tokio::test]
async fn live_token_is_returned_without_refresh() {
    let (provider, store, manager) = setup();
    let token = live_token("user-abc");
    store.set("access_token", &token).await.unwrap();

    assert_eq!(manager.access_token().await, Some(token));
    assert!(provider.calls().await.is_empty());
}

#[tokio::test]
async fn expired_token_is_refreshed_silently() {
    let (provider, store, manager) = setup();
    seed_expired_session(&store).await;
    let fresh = token_set("user-abc", None);
    provider.push_refresh(Ok(fresh.clone())).await;

    assert_eq!(manager.id_token().await, Some(fresh.id_token));
    assert_eq!(
        store.get("access_token").await.unwrap(),
        Some(fresh.access_token)
    );
    // The provider does not rotate refresh tokens; the old one is kept.
    assert_eq!(
        store.get("refresh_token").await.unwrap().as_deref(),
        Some("refresh-1")
    );
    assert_eq!(
        provider.calls().await,
        vec![ProviderCall::Refresh {
            refresh_token: "refresh-1".into()
        }]
    );
}

#[tokio::test]
async fn transient_refresh_failure_preserves_credentials() {
    let (provider, store, manager) = setup();
    seed_expired_session(&store).await;
    provider
        .push_refresh(Err(MyemteeError::provider(
            None,
            "HTTP request failed: connection reset",
        )))
        .await;

    assert_eq!(manager.access_token().await, None);
    for key in TOKEN_KEYS {
        assert!(store.contains(key).await, "{key} was cleared");
    }
}

#[tokio::test]
async fn terminal_refresh_failure_clears_credentials() {
    let (provider, store, manager) = setup();
    seed_expired_session(&store).await;
    store.set("user_info", "{}").await.unwrap();
    store.set("device_remembered:alice", "true").await.unwrap();
    provider
        .push_refresh(Err(MyemteeError::NotAuthorized(
            "Refresh Token has expired".into(),
        )))
        .await;

    let err = manager.refresh_session().await.unwrap_err();
    assert!(err.is_credential_rejected());
    for key in TOKEN_KEYS {
        assert!(!store.contains(key).await, "{key} survived");
    }
    assert!(!store.contains("user_info").await);
    assert!(store.contains("device_remembered:alice").await);
    assert_eq!(manager.state().await, SessionState::SignedOut);
}

#[tokio::test]
async fn refresh_without_refresh_token_is_not_authenticated() {
    let (provider, _store, manager) = setup();
    assert!(matches!(
        manager.refresh_session().await,
        Err(MyemteeError::NotAuthenticated)
    ));
    assert!(provider.calls().await.is_empty());
}

#[tokio::test]
async fn sign_out_clears_everything_even_when_revoke_fails() {
    let (provider, store, manager) = setup();
    store.set("access_token", &live_token("user-abc")).await.unwrap();
    store.set("id_token", &live_token("user-abc")).await.unwrap();
    store.set("refresh_token", "r").await.unwrap();
    store.set("user_info", "{}").await.unwrap();
    store.set("history_cache", "{}").await.unwrap();
    provider.fail_global_sign_out(true);

    manager.sign_out().await.unwrap();

    for key in TOKEN_KEYS.into_iter().chain(["user_info", "history_cache"]) {
        assert!(!store.contains(key).await, "{key} survived sign-out");
    }
    assert!(provider.calls().await.contains(&ProviderCall::GlobalSignOut));
    assert_eq!(manager.state().await, SessionState::SignedOut);
    assert!(!manager.is_authenticated().await);
}

#[tokio::test]
async fn user_identity_prefers_id_token_sub() {
    let (_provider, store, manager) = setup();
    store.set("id_token", &live_token("sub-from-token")).await.unwrap();
    store
        .set("user_info", r#"{"username":"alice","sub":"sub-from-profile"}"#)
        .await
        .unwrap();
    assert_eq!(manager.user_identity().await.as_deref(), Some("sub-from-token"));

    store.remove("id_token").await.unwrap();
    assert_eq!(
        manager.user_identity().await.as_deref(),
        Some("sub-from-profile")
    );
}

#[tokio::test]
async fn is_authenticated_never_refreshes() {
    let (provider, store, manager) = setup();
    seed_expired_session(&store).await;
    assert!(!manager.is_authenticated().await);
    assert!(provider.calls().await.is_empty());
}

#[tokio::test]
async fn resume_restores_signed_in_state() {
    let (_provider, store, manager) = setup();
    store.set("access_token", &live_token("user-abc")).await.unwrap();
    assert!(manager.resume().await);
    assert_eq!(manager.state().await, SessionState::SignedIn);
}

#[tokio::test]
async fn account_flows_pass_through() {
    let (provider, _store, manager) = setup();
    let result = manager
        .sign_up("bob@example.com", &password(), "Bob")
        .await
        .unwrap();
    assert_eq!(result.user_sub, "sub-bob@example.com");
    manager.confirm_sign_up("bob@example.com", " 111222 ").await.unwrap();
    let delivery = manager.forgot_password("bob@example.com").await.unwrap();
    assert_eq!(delivery.unwrap().medium.as_deref(), Some("EMAIL"));
    manager
        .confirm_forgot_password("bob@example.com", "333444", &password())
        .await
        .unwrap();

    let calls = provider.calls().await;
    assert!(calls.contains(&ProviderCall::ConfirmSignUp {
        username: "bob@example.com".into(),
        code: "111222".into(),
    }));
    assert_eq!(calls.len(), 4);
}
