// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entry-level encryption of the sensitive fields.
//!
//! `feeling`, `notes` and `consumed` are sealed independently. Sleep numbers,
//! `timestamp`, `localDate` and `userId` are left readable for server-side
//! indexing. Key derivation runs once per codec, so batch decryption pays the
//! PBKDF2 cost only once.

use myemtee_core::{ConsumedFlags, ConsumedRepresentation, Entry, MyemteeError, WireEntry};
use tracing::warn;

use crate::cipher::{decrypt_field, encrypt_field};
use crate::kdf::{DerivedKey, derive_key};

/// Encrypts and decrypts entries for a single user.
#[derive(Debug)]
pub struct EntryCodec {
    key: DerivedKey,
}

impl EntryCodec {
    /// Derive the key for `user_identity` and build a codec around it.
    pub fn for_identity(user_identity: &str) -> Result<Self, MyemteeError> {
        Ok(Self {
            key: derive_key(user_identity)?,
        })
    }

    pub fn from_key(key: DerivedKey) -> Self {
        Self { key }
    }

    /// Seal the sensitive fields of `entry` for transmission.
    pub fn encode(&self, entry: &Entry) -> Result<WireEntry, MyemteeError> {
        let notes = entry
            .notes
            .as_deref()
            .map(|n| encrypt_field(n, &self.key))
            .transpose()?;

        let consumed = match &entry.consumed {
            Some(flags) => {
                let json = serde_json::to_string(flags).map_err(|e| {
                    MyemteeError::Crypto(format!("failed to serialize consumed flags: {e}"))
                })?;
                Some(ConsumedRepresentation::Encrypted(encrypt_field(
                    &json, &self.key,
                )?))
            }
            None => None,
        };

        Ok(WireEntry {
            user_id: entry.user_id.clone(),
            feeling: encrypt_field(&entry.feeling, &self.key)?,
            notes,
            consumed,
            sleep_quality: entry.sleep_quality,
            sleep_duration: entry.sleep_duration,
            timestamp: entry.timestamp.clone(),
            local_date: entry.local_date.clone(),
        })
    }

    /// Open the sensitive fields of a received entry.
    ///
    /// Never fails: legacy plaintext values come back as stored, and a
    /// consumption record that cannot be parsed becomes all-false.
    pub fn decode(&self, wire: &WireEntry) -> Entry {
        Entry {
            user_id: wire.user_id.clone(),
            feeling: decrypt_field(&wire.feeling, &self.key),
            notes: wire.notes.as_deref().map(|n| decrypt_field(n, &self.key)),
            consumed: wire.consumed.as_ref().and_then(|c| self.decode_consumed(c)),
            sleep_quality: wire.sleep_quality,
            sleep_duration: wire.sleep_duration,
            timestamp: wire.timestamp.clone(),
            local_date: wire.local_date.clone(),
        }
    }

    /// Decrypt a lone feeling value.
    pub fn decode_feeling(&self, value: &str) -> String {
        decrypt_field(value, &self.key)
    }

    fn decode_consumed(&self, consumed: &ConsumedRepresentation) -> Option<ConsumedFlags> {
        match consumed {
            ConsumedRepresentation::Plain(flags) => Some(*flags),
            ConsumedRepresentation::Encrypted(s) if s.is_empty() => None,
            ConsumedRepresentation::Encrypted(s) => {
                let json = decrypt_field(s, &self.key);
                match serde_json::from_str::<ConsumedFlags>(&json) {
                    Ok(flags) => Some(flags),
                    Err(e) => {
                        warn!(error = %e, "unreadable consumption record, defaulting to none");
                        Some(ConsumedFlags::default())
                    }
                }
            }
        }
    }

    pub(crate) fn key(&self) -> &DerivedKey {
        &self.key
    }
}

async fn with_codec<T, F>(user_identity: &str, f: F) -> Result<T, MyemteeError>
where
    T: Send + 'static,
    F: FnOnce(&EntryCodec) -> Result<T, MyemteeError> + Send + 'static,
{
    let identity = user_identity.to_string();
    tokio::task::spawn_blocking(move || {
        let codec = EntryCodec::for_identity(&identity)?;
        f(&codec)
    })
    .await
    .map_err(|e| MyemteeError::Internal(format!("encryption task failed: {e}")))?
}

/// Seal `entry` for `user_identity` off the async executor.
pub async fn encrypt_entry(entry: &Entry, user_identity: &str) -> Result<WireEntry, MyemteeError> {
    let entry = entry.clone();
    with_codec(user_identity, move |codec| codec.encode(&entry)).await
}

/// Open one received entry for `user_identity`.
pub async fn decrypt_entry(wire: &WireEntry, user_identity: &str) -> Result<Entry, MyemteeError> {
    let wire = wire.clone();
    with_codec(user_identity, move |codec| Ok(codec.decode(&wire))).await
}

/// Open a batch of entries, deriving the key once. Order is preserved.
pub async fn decrypt_entries(
    wires: Vec<WireEntry>,
    user_identity: &str,
) -> Result<Vec<Entry>, MyemteeError> {
    with_codec(user_identity, move |codec| {
        Ok(wires.iter().map(|w| codec.decode(w)).collect())
    })
    .await
}

/// Decrypt a single feeling value, as returned by the history endpoint.
pub async fn decrypt_feeling(value: &str, user_identity: &str) -> Result<String, MyemteeError> {
    let value = value.to_string();
    with_codec(user_identity, move |codec| Ok(codec.decode_feeling(&value))).await
}
