// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side field encryption for Myemtee mood entries.
//!
//! Each user's key is derived deterministically from their identity claim
//! (PBKDF2-HMAC-SHA256), so any device the user signs in on can read their
//! history without a key exchange. The sensitive fields of an entry are
//! sealed with AES-256-GCM and a fresh random nonce per field.
//!
//! Decryption is tolerant: data written before encryption was introduced is
//! returned as stored rather than rejected.

pub mod cipher;
pub mod codec;
pub mod history;
pub mod kdf;

pub use cipher::{decrypt_field, encrypt_field, looks_encrypted};
pub use codec::{EntryCodec, decrypt_entries, decrypt_entry, decrypt_feeling, encrypt_entry};
pub use history::feeling_averages;
pub use kdf::{DerivedKey, derive_key};
