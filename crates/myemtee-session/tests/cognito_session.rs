// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full stack: the user-pool provider against a mock endpoint, with
//! credentials persisted in a real SQLite store.

use std::sync::Arc;

use myemtee_config::model::{IdentityConfig, StorageConfig};
use myemtee_core::{KeyValueStore, PluginAdapter};
use myemtee_session::{CognitoIdentityProvider, SessionManager, SessionState, SignInOutcome};
use myemtee_storage::CredentialStore;
use myemtee_test_utils::tokens::live_token;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn target(op: &str) -> String {
    format!("AWSCognitoIdentityProviderService.{op}")
}

fn store_in(dir: &tempfile::TempDir) -> Arc<CredentialStore> {
    Arc::new(CredentialStore::new(StorageConfig {
        database_path: dir.path().join("credentials.db").display().to_string(),
        fallback_path: Some(dir.path().join("fallback.json").display().to_string()),
        wal_mode: true,
        history_cache_ttl_secs: 300,
    }))
}

fn manager(server: &MockServer, store: Arc<CredentialStore>) -> SessionManager {
    let provider = CognitoIdentityProvider::new(&IdentityConfig {
        client_id: "test-client".into(),
        endpoint: Some(server.uri()),
        ..Default::default()
    })
    .unwrap();
    SessionManager::new(Arc::new(provider), store)
}

async fn mount_get_user(server: &MockServer) {
    Mock::given(method("POST"))
        .and(header("x-amz-target", target("GetUser").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Username": "alice",
            "UserAttributes": [
                {"Name": "sub", "Value": "user-abc"},
                {"Name": "email", "Value": "alice@example.com"},
                {"Name": "email_verified", "Value": "true"}
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn mfa_sign_in_survives_restart() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let access = live_token("user-abc");
    let id = live_token("user-abc");

    Mock::given(method("POST"))
        .and(header("x-amz-target", target("InitiateAuth").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ChallengeName": "SOFTWARE_TOKEN_MFA",
            "Session": "opaque-session",
            "ChallengeParameters": {}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", target("RespondToAuthChallenge").as_str()))
        .and(body_partial_json(json!({
            "ChallengeResponses": {"SOFTWARE_TOKEN_MFA_CODE": "123456"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AuthenticationResult": {
                "AccessToken": access,
                "IdToken": id,
                "RefreshToken": "refresh-1"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_get_user(&server).await;

    {
        let store = store_in(&dir);
        let session = manager(&server, store.clone());
        let outcome = session
            .sign_in("alice", &SecretString::from("hunter22"))
            .await
            .unwrap();
        let SignInOutcome::MfaRequired(challenge) = outcome else {
            panic!("expected MFA challenge");
        };
        assert!(store.get("access_token").await.unwrap().is_none());

        session.verify_mfa(&challenge, "123456").await.unwrap();
        assert_eq!(session.state().await, SessionState::SignedIn);
        store.shutdown().await.unwrap();
    }

    let store = store_in(&dir);
    let session = manager(&server, store);
    assert!(session.resume().await);
    assert_eq!(session.access_token().await, Some(access));
    assert_eq!(session.user_identity().await.as_deref(), Some("user-abc"));
    let user = session.current_user().await.unwrap().unwrap();
    assert_eq!(user.email.as_deref(), Some("alice@example.com"));
    assert!(user.email_verified);
}

#[tokio::test]
async fn rejected_refresh_wipes_persisted_tokens() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"AuthFlow": "REFRESH_TOKEN_AUTH"})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "NotAuthorizedException",
            "message": "Refresh Token has expired"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_in(&dir);
    store
        .set("access_token", &myemtee_test_utils::tokens::expired_token("user-abc"))
        .await
        .unwrap();
    store.set("refresh_token", "refresh-1").await.unwrap();
    let session = manager(&server, store.clone());

    assert_eq!(session.access_token().await, None);
    assert!(store.get("access_token").await.unwrap().is_none());
    assert!(store.get("refresh_token").await.unwrap().is_none());
}

#[tokio::test]
async fn throttled_refresh_keeps_persisted_tokens() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "com.amazonaws#TooManyRequestsException",
            "message": "Rate exceeded"
        })))
        .mount(&server)
        .await;

    let store = store_in(&dir);
    store
        .set("access_token", &myemtee_test_utils::tokens::expired_token("user-abc"))
        .await
        .unwrap();
    store.set("refresh_token", "refresh-1").await.unwrap();
    let session = manager(&server, store.clone());

    assert_eq!(session.access_token().await, None);
    assert_eq!(
        store.get("refresh_token").await.unwrap().as_deref(),
        Some("refresh-1")
    );
    assert!(store.get("access_token").await.unwrap().is_some());
}
