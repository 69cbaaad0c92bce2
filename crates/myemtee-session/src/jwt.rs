// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unverified inspection of JWT claims.
//!
//! The provider signs the tokens; this client only needs the expiry and the
//! identity claim, so the signature is not checked here.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use myemtee_core::MyemteeError;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Claims {
    pub exp: Option<i64>,
    pub sub: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "cognito:username")]
    pub username: Option<String>,
}

/// Decode the payload segment of `token`.
pub fn decode_claims(token: &str) -> Result<Claims, MyemteeError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) => payload,
        _ => return Err(MyemteeError::Validation("token is not a JWT".to_string())),
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| MyemteeError::Validation(format!("token payload is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| MyemteeError::Validation(format!("token payload is not JSON: {e}")))
}

/// Whether `token` has expired at `now` (unix seconds).
///
/// A token that cannot be decoded or lacks `exp` counts as expired.
pub fn is_expired(token: &str, now: i64) -> bool {
    match decode_claims(token) {
        Ok(Claims { exp: Some(exp), .. }) => exp <= now,
        _ => true,
    }
}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
