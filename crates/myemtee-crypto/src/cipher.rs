// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM field encryption with a URL-safe text encoding.
//!
//! Every call to [`seal`] generates a fresh random 96-bit nonce via the system
//! CSPRNG. Nonce reuse would be catastrophic for GCM security.
//!
//! Sealed field layout, before encoding: `nonce (12) || ciphertext || tag (16)`.
//! The encoded form is unpadded URL-safe base64. Decoding also accepts the
//! standard alphabet with or without padding.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use myemtee_core::MyemteeError;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::warn;

use crate::kdf::DerivedKey;

/// GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Values shorter than this are never treated as ciphertext.
const MIN_ENCODED_LEN: usize = 16;

fn less_safe_key(key: &DerivedKey) -> Result<LessSafeKey, MyemteeError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key.as_bytes())
        .map_err(|_| MyemteeError::Crypto("failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` and return `nonce || ciphertext || tag`.
pub fn seal(key: &DerivedKey, plaintext: &[u8]) -> Result<Vec<u8>, MyemteeError> {
    let less_safe = less_safe_key(key)?;

    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| MyemteeError::Crypto("failed to generate random nonce".to_string()))?;

    let mut in_out = plaintext.to_vec();
    less_safe
        .seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| MyemteeError::Crypto("AES-256-GCM encryption failed".to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&in_out);
    Ok(sealed)
}

/// Decrypt a buffer produced by [`seal`].
///
/// Fails on a short buffer, a wrong key, or tampered data.
pub fn open(key: &DerivedKey, sealed: &[u8]) -> Result<Vec<u8>, MyemteeError> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(MyemteeError::Crypto(
            "sealed data is shorter than nonce and tag".to_string(),
        ));
    }

    let less_safe = less_safe_key(key)?;
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| MyemteeError::Crypto("invalid nonce length".to_string()))?;

    let mut in_out = ciphertext.to_vec();
    let plaintext = less_safe
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| {
            MyemteeError::Crypto(
                "AES-256-GCM decryption failed -- wrong key or corrupted data".to_string(),
            )
        })?;

    Ok(plaintext.to_vec())
}

/// Encrypt one text field. An empty string is returned unchanged.
pub fn encrypt_field(plaintext: &str, key: &DerivedKey) -> Result<String, MyemteeError> {
    if plaintext.is_empty() {
        return Ok(String::new());
    }
    let sealed = seal(key, plaintext.as_bytes())?;
    Ok(URL_SAFE_NO_PAD.encode(sealed))
}

/// Decrypt one text field, tolerating legacy plaintext.
///
/// Never fails. Values that do not look like ciphertext, do not decode, fail
/// authentication, or decrypt to invalid UTF-8 are returned as given.
pub fn decrypt_field(value: &str, key: &DerivedKey) -> String {
    let Some(sealed) = decode_field(value) else {
        return value.to_string();
    };
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return value.to_string();
    }

    match open(key, &sealed).map(String::from_utf8) {
        Ok(Ok(plaintext)) => plaintext,
        Ok(Err(_)) => {
            warn!(len = value.len(), "decrypted field is not valid UTF-8, keeping stored value");
            value.to_string()
        }
        Err(e) => {
            warn!(len = value.len(), error = %e, "field decryption failed, keeping stored value");
            value.to_string()
        }
    }
}

/// Whether `value` is shaped like an encoded sealed field.
///
/// Only the base64 alphabets (standard and URL-safe, plus padding) are
/// accepted, and anything under 16 characters is treated as plaintext.
pub fn looks_encrypted(value: &str) -> bool {
    value.len() >= MIN_ENCODED_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'-' | b'_' | b'='))
}

fn decode_field(value: &str) -> Option<Vec<u8>> {
    if !looks_encrypted(value) {
        return None;
    }
    let normalized: String = value
        .chars()
        .filter(|c| *c != '=')
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    STANDARD_NO_PAD.decode(normalized).ok()
}
