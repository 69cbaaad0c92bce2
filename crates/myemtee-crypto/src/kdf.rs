// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic per-user key derivation.
//!
//! The user identity claim is stretched with PBKDF2-HMAC-SHA256 under a fixed,
//! public, application-wide salt. There is no key exchange: the same identity
//! must yield the same key forever, or previously stored entries become
//! unreadable. The identity is the only secret-adjacent input, so anyone who
//! can guess it can derive the key.

use std::num::NonZeroU32;

use myemtee_core::MyemteeError;
use ring::pbkdf2;
use zeroize::Zeroizing;

/// Salt shared by every user. Changing it orphans all stored ciphertext.
pub const KDF_SALT: &[u8] = b"myemtee-mood-tracker-v1";

/// PBKDF2 round count. Changing it orphans all stored ciphertext.
pub const KDF_ITERATIONS: u32 = 100_000;

/// Length of the derived AES-256-GCM key in bytes.
pub const KEY_LEN: usize = 32;

const ROUNDS: NonZeroU32 = match NonZeroU32::new(KDF_ITERATIONS) {
    Some(n) => n,
    None => panic!("KDF_ITERATIONS must be non-zero"),
};

/// Symmetric key material derived from a user identity.
///
/// Lives only in memory and is zeroed on drop. Debug output omits the bytes.
pub struct DerivedKey(Zeroizing<[u8; KEY_LEN]>);

impl DerivedKey {
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

impl Eq for DerivedKey {}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DerivedKey").field(&"[REDACTED]").finish()
    }
}

/// Derive the entry encryption key for `user_identity`.
///
/// Pure and deterministic. Fails only on an empty identity.
pub fn derive_key(user_identity: &str) -> Result<DerivedKey, MyemteeError> {
    if user_identity.is_empty() {
        return Err(MyemteeError::Crypto(
            "user identity must not be empty".to_string(),
        ));
    }

    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        ROUNDS,
        KDF_SALT,
        user_identity.as_bytes(),
        output.as_mut(),
    );
    Ok(DerivedKey(output))
}
