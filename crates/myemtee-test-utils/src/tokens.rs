// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unsigned JWTs for tests. Only the payload matters to the client.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use myemtee_core::AuthTokens;

/// A token for `sub` expiring at `exp` (unix seconds).
pub fn jwt_with_exp(exp: i64, sub: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "sub": sub, "exp": exp }).to_string());
    format!("{header}.{payload}.test-signature")
}

/// A token valid for the next hour.
pub fn live_token(sub: &str) -> String {
    jwt_with_exp(chrono::Utc::now().timestamp() + 3600, sub)
}

/// A token that expired a minute ago.
pub fn expired_token(sub: &str) -> String {
    jwt_with_exp(chrono::Utc::now().timestamp() - 60, sub)
}

/// A live access/id pair for `sub` plus `refresh_token`.
pub fn token_set(sub: &str, refresh_token: Option<&str>) -> AuthTokens {
    AuthTokens {
        access_token: live_token(sub),
        id_token: live_token(sub),
        refresh_token: refresh_token.map(str::to_string),
    }
}
