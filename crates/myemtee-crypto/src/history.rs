// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-day feeling averages for the calendar view.

use std::collections::BTreeMap;

use myemtee_core::{DayFeelings, MyemteeError};

use crate::codec::EntryCodec;

impl EntryCodec {
    /// Average the feelings of each day, rounded to the nearest integer.
    ///
    /// Plain numeric values are used directly; anything else is decrypted
    /// first. Values that still do not start with an integer (legacy emoji,
    /// foreign ciphertext) are skipped, and days with nothing usable are
    /// left out of the result.
    pub fn feeling_averages(&self, days: &[DayFeelings]) -> BTreeMap<String, i64> {
        days.iter()
            .filter_map(|day| {
                let values: Vec<f64> = day
                    .feelings
                    .iter()
                    .filter_map(|f| self.feeling_value(f))
                    .collect();
                if values.is_empty() {
                    return None;
                }
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                Some((day.date.clone(), (mean + 0.5).floor() as i64))
            })
            .collect()
    }

    fn feeling_value(&self, raw: &str) -> Option<f64> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(n) = trimmed.parse::<f64>()
            && n.is_finite()
        {
            return Some(n);
        }
        leading_integer(&self.decode_feeling(raw)).map(|n| n as f64)
    }
}

/// Parse the integer prefix of `s`, ignoring leading whitespace and any
/// trailing garbage. `"4 (ok)"` yields 4, `"😊"` yields nothing.
fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let sign_len = usize::from(s.starts_with(['+', '-']));
    let digits_len = s[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    s[..sign_len + digits_len].parse().ok()
}

/// Compute per-day averages for `user_identity` off the async executor.
pub async fn feeling_averages(
    days: Vec<DayFeelings>,
    user_identity: &str,
) -> Result<BTreeMap<String, i64>, MyemteeError> {
    let identity = user_identity.to_string();
    tokio::task::spawn_blocking(move || {
        let codec = EntryCodec::for_identity(&identity)?;
        Ok(codec.feeling_averages(&days))
    })
    .await
    .map_err(|e| MyemteeError::Internal(format!("averaging task failed: {e}")))?
}
