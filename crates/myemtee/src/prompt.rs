// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal prompts for passwords, codes and yes/no questions.
//!
//! All prompts go to stderr so stdout stays machine-readable.

use std::io::{BufRead, IsTerminal, Write};

use myemtee_core::MyemteeError;
use secrecy::{ExposeSecret, SecretString};

/// Environment variable consulted before prompting for a password.
pub const PASSWORD_ENV_VAR: &str = "MYEMTEE_PASSWORD";

/// Answer to the remember-device question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RememberChoice {
    Yes,
    No,
    Never,
}

impl RememberChoice {
    /// Parse a typed answer. Anything unrecognised counts as "no".
    pub fn parse(answer: &str) -> Self {
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Self::Yes,
            "never" => Self::Never,
            _ => Self::No,
        }
    }
}

/// Read a password from `MYEMTEE_PASSWORD` or an interactive TTY prompt.
pub fn password(label: &str) -> Result<SecretString, MyemteeError> {
    if let Ok(value) = std::env::var(PASSWORD_ENV_VAR)
        && !value.is_empty()
    {
        return Ok(SecretString::from(value));
    }

    if !std::io::stdin().is_terminal() {
        return Err(MyemteeError::Validation(format!(
            "no password provided. Set {PASSWORD_ENV_VAR} or run interactively."
        )));
    }
    eprint!("{label}");
    let value = rpassword::read_password()
        .map_err(|e| MyemteeError::Internal(format!("failed to read password: {e}")))?;
    if value.is_empty() {
        return Err(MyemteeError::Validation("empty password not allowed".to_string()));
    }
    Ok(SecretString::from(value))
}

/// Prompt twice for a new password and require both entries to match.
pub fn new_password() -> Result<SecretString, MyemteeError> {
    if let Ok(value) = std::env::var(PASSWORD_ENV_VAR)
        && !value.is_empty()
    {
        return Ok(SecretString::from(value));
    }

    let first = password("New password: ")?;
    let second = password("Confirm password: ")?;
    if first.expose_secret() != second.expose_secret() {
        return Err(MyemteeError::Validation("passwords do not match".to_string()));
    }
    Ok(first)
}

/// Read one trimmed line from stdin after printing `label` to stderr.
pub fn line(label: &str) -> Result<String, MyemteeError> {
    eprint!("{label}");
    std::io::stderr()
        .flush()
        .map_err(|e| MyemteeError::Internal(format!("failed to flush prompt: {e}")))?;

    let mut input = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut input)
        .map_err(|e| MyemteeError::Internal(format!("failed to read input: {e}")))?;
    if read == 0 {
        return Err(MyemteeError::Validation("input closed".to_string()));
    }
    Ok(input.trim().to_string())
}

/// Ask whether to remember this device. Non-interactive sessions answer "no".
pub fn remember_device() -> Result<RememberChoice, MyemteeError> {
    if !std::io::stdin().is_terminal() {
        return Ok(RememberChoice::No);
    }
    line("Remember this device and skip MFA next time? [y/N/never] ")
        .map(|answer| RememberChoice::parse(&answer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remember_answers() {
        assert_eq!(RememberChoice::parse("Y"), RememberChoice::Yes);
        assert_eq!(RememberChoice::parse(" yes "), RememberChoice::Yes);
        assert_eq!(RememberChoice::parse("never"), RememberChoice::Never);
        assert_eq!(RememberChoice::parse(""), RememberChoice::No);
        assert_eq!(RememberChoice::parse("maybe"), RememberChoice::No);
    }
}
