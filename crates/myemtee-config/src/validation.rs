// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::MyemteeConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
/// `identity.client_id` is not required here: offline commands such as
/// `decrypt` work without a user pool, so the provider checks it on construction.
pub fn validate_config(config: &MyemteeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.app.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "app.log_level `{}` must be one of: {}",
                config.app.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.identity.region.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "identity.region must not be empty".to_string(),
        });
    }

    if let Some(endpoint) = &config.identity.endpoint
        && !(endpoint.starts_with("https://") || endpoint.starts_with("http://"))
    {
        errors.push(ConfigError::Validation {
            message: format!("identity.endpoint `{endpoint}` must be an http(s) URL"),
        });
    }

    if config.identity.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "identity.timeout_secs must be at least 1".to_string(),
        });
    }

    if config.identity.device_name.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "identity.device_name must not be empty".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if let Some(fallback) = &config.storage.fallback_path
        && fallback.trim() == config.storage.database_path.trim()
    {
        errors.push(ConfigError::Validation {
            message: "storage.fallback_path must differ from storage.database_path".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
