// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Myemtee client.

use thiserror::Error;

/// The primary error type used across all Myemtee adapter traits and core operations.
#[derive(Debug, Error)]
pub enum MyemteeError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential store errors that neither the primary nor the fallback tier could absorb.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Key derivation or encryption failures on the write path.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Identity provider or network failure. Retryable; stored credentials are kept.
    #[error("provider error: {message}")]
    Provider {
        /// Exception name reported by the provider, when one was returned.
        code: Option<String>,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The provider rejected the presented credentials (wrong password, expired
    /// or revoked refresh token).
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// No usable session exists locally.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The provider answered with an authentication challenge this client cannot complete.
    #[error("unsupported authentication challenge: {0}")]
    UnsupportedChallenge(String),

    /// Caller-supplied input was rejected before reaching the provider.
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MyemteeError {
    /// Shorthand for a storage error carrying only a message.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            source: message.into().into(),
        }
    }

    /// Shorthand for a provider error without an underlying source.
    pub fn provider(code: Option<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Returns true when the failure means the current session can never be
    /// resumed and local credentials must be wiped.
    ///
    /// Transport failures, throttling, and other provider errors return false.
    pub fn is_credential_rejected(&self) -> bool {
        match self {
            Self::NotAuthorized(_) => true,
            Self::Provider { code, message, .. } => {
                code.as_deref() == Some("NotAuthorizedException")
                    || message.contains("Refresh Token has expired")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_authorized_is_credential_rejected() {
        assert!(MyemteeError::NotAuthorized("Invalid Refresh Token".into()).is_credential_rejected());
    }

    #[test]
    fn expired_refresh_message_is_credential_rejected() {
        let err = MyemteeError::provider(None, "Refresh Token has expired");
        assert!(err.is_credential_rejected());
    }

    #[test]
    fn transport_failure_is_not_credential_rejected() {
        let err = MyemteeError::Provider {
            code: None,
            message: "HTTP request failed: connection reset".into(),
            source: Some(Box::new(std::io::Error::other("reset"))),
        };
        assert!(!err.is_credential_rejected());
        assert!(!MyemteeError::provider(Some("TooManyRequestsException".into()), "slow down")
            .is_credential_rejected());
        assert!(!MyemteeError::storage("disk full").is_credential_rejected());
    }
}
