// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entry commands: seal and open mood entries, build calendar averages.
//!
//! Input is JSON read from a file or stdin; output is JSON on stdout.

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use myemtee_core::{DayFeelings, Entry, MyemteeError, WireEntry};
use myemtee_crypto::{EntryCodec, decrypt_entries, feeling_averages};
use myemtee_storage::MonthAverages;

use crate::account::{Client, print_json};

/// A single JSON object or an array of them.
#[derive(Debug, serde::Deserialize, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> (Vec<T>, bool) {
        match self {
            Self::Many(items) => (items, true),
            Self::One(item) => (vec![item], false),
        }
    }

    fn from_vec(mut items: Vec<T>, many: bool) -> Self {
        match items.pop() {
            Some(item) if !many => Self::One(item),
            Some(item) => {
                items.push(item);
                Self::Many(items)
            }
            None => Self::Many(items),
        }
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(input: Option<&Path>) -> Result<T, MyemteeError> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            MyemteeError::Validation(format!("failed to read {}: {e}", path.display()))
        })?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| MyemteeError::Validation(format!("failed to read stdin: {e}")))?;
            buf
        }
    };
    serde_json::from_str(&raw).map_err(|e| MyemteeError::Validation(format!("invalid JSON input: {e}")))
}

/// The identity claim keying entry encryption: `--identity` if given, else
/// the signed-in user's `sub`.
async fn resolve_identity(
    client: Option<&Client>,
    explicit: Option<String>,
) -> Result<String, MyemteeError> {
    if let Some(identity) = explicit {
        return Ok(identity);
    }
    let client = client.ok_or(MyemteeError::NotAuthenticated)?;
    client
        .session
        .user_identity()
        .await
        .ok_or(MyemteeError::NotAuthenticated)
}

/// Seal entries with a single key derivation.
pub async fn seal(entries: Vec<Entry>, identity: &str) -> Result<Vec<WireEntry>, MyemteeError> {
    let identity = identity.to_string();
    tokio::task::spawn_blocking(move || {
        let codec = EntryCodec::for_identity(&identity)?;
        entries.iter().map(|entry| codec.encode(entry)).collect()
    })
    .await
    .map_err(|e| MyemteeError::Internal(format!("encryption task failed: {e}")))?
}

pub async fn encrypt(
    client: Option<&Client>,
    input: Option<&Path>,
    identity: Option<String>,
) -> Result<(), MyemteeError> {
    let (entries, many) = read_json::<OneOrMany<Entry>>(input)?.into_vec();
    let identity = resolve_identity(client, identity).await?;
    let sealed = seal(entries, &identity).await?;
    debug!(count = sealed.len(), "entries encrypted");
    print_json(&OneOrMany::from_vec(sealed, many))
}

pub async fn decrypt(
    client: Option<&Client>,
    input: Option<&Path>,
    identity: Option<String>,
) -> Result<(), MyemteeError> {
    let (wires, many) = read_json::<OneOrMany<WireEntry>>(input)?.into_vec();
    let identity = resolve_identity(client, identity).await?;
    let entries = decrypt_entries(wires, &identity).await?;
    debug!(count = entries.len(), "entries decrypted");
    print_json(&OneOrMany::from_vec(entries, many))
}

/// Compute rounded daily averages for the days of `month` (`YYYY-MM`) and
/// store them in the history cache.
pub async fn month_averages(
    client: &Client,
    month: &str,
    days: Vec<DayFeelings>,
    identity: &str,
) -> Result<MonthAverages, MyemteeError> {
    let prefix = format!("{month}-");
    let in_month: Vec<DayFeelings> = days
        .into_iter()
        .filter(|day| day.date.starts_with(&prefix))
        .collect();
    let averages = feeling_averages(in_month, identity).await?;
    client.history().put_month(month, averages.clone()).await?;
    Ok(averages)
}

pub async fn calendar(
    client: &Client,
    month: &str,
    input: Option<&Path>,
    identity: Option<String>,
    refresh: bool,
) -> Result<(), MyemteeError> {
    if chrono::NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d").is_err() {
        return Err(MyemteeError::Validation(format!(
            "month `{month}` must be formatted YYYY-MM"
        )));
    }
    let identity = resolve_identity(Some(client), identity).await?;

    // A cache hit does not read the input at all.
    if !refresh && let Some(cached) = client.history().get_month(month).await? {
        debug!(month, "calendar served from cache");
        return print_json(&cached);
    }
    let days = read_json::<Vec<DayFeelings>>(input)?;
    let averages = month_averages(client, month, days, &identity).await?;
    print_json(&averages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use myemtee_config::model::MyemteeConfig;
    use myemtee_test_utils::{MemoryStore, MockIdentityProvider};

    fn client() -> Client {
        Client::from_parts(
            MyemteeConfig::default(),
            Arc::new(MockIdentityProvider::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    #[test]
    fn one_or_many_keeps_input_shape() {
        let one: OneOrMany<u8> = serde_json::from_str("7").unwrap();
        let (items, many) = one.into_vec();
        assert_eq!(serde_json::to_string(&OneOrMany::from_vec(items, many)).unwrap(), "7");

        let list: OneOrMany<u8> = serde_json::from_str("[1,2]").unwrap();
        let (items, many) = list.into_vec();
        assert_eq!(
            serde_json::to_string(&OneOrMany::from_vec(items, many)).unwrap(),
            "[1,2]"
        );
    }

    #[tokio::test]
    async fn sealed_batch_opens_with_same_identity() {
        let entries = vec![
            Entry {
                feeling: "4".into(),
                notes: Some("good sleep".into()),
                timestamp: "2025-05-14T08:00:00.000Z".into(),
                ..Default::default()
            },
            Entry {
                feeling: "2".into(),
                timestamp: "2025-05-15T08:00:00.000Z".into(),
                ..Default::default()
            },
        ];
        let sealed = seal(entries.clone(), "user-abc").await.unwrap();
        assert_ne!(sealed[0].feeling, "4");

        let opened = decrypt_entries(sealed, "user-abc").await.unwrap();
        assert_eq!(opened, entries);
    }

    #[tokio::test]
    async fn month_averages_are_scoped_to_month_and_cached() {
        let client = client();
        let codec = EntryCodec::for_identity("user-abc").unwrap();
        let sealed_five = codec
            .encode(&Entry {
                feeling: "5".into(),
                timestamp: "2025-05-14T20:00:00.000Z".into(),
                ..Default::default()
            })
            .unwrap()
            .feeling;
        let days = vec![
            DayFeelings {
                date: "2025-05-14".into(),
                feelings: vec!["2".into(), sealed_five],
            },
            DayFeelings {
                date: "2025-06-01".into(),
                feelings: vec!["1".into()],
            },
        ];

        let averages = month_averages(&client, "2025-05", days, "user-abc")
            .await
            .unwrap();
        assert_eq!(averages.len(), 1);
        assert_eq!(averages["2025-05-14"], 4);

        let cached = client.history().get_month("2025-05").await.unwrap();
        assert_eq!(cached, Some(averages));
        assert_eq!(client.history().get_month("2025-06").await.unwrap(), None);
    }
}
