// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./myemtee.toml` > `~/.config/myemtee/myemtee.toml` > `/etc/myemtee/myemtee.toml`
//! with environment variable overrides via `MYEMTEE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::MyemteeConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/myemtee/myemtee.toml`
/// 3. `~/.config/myemtee/myemtee.toml`
/// 4. `./myemtee.toml`
/// 5. `MYEMTEE_*` environment variables
pub fn load_config() -> Result<MyemteeConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<MyemteeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MyemteeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MyemteeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MyemteeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(MyemteeConfig::default()))
        .merge(Toml::file("/etc/myemtee/myemtee.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("myemtee/myemtee.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("myemtee.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `MYEMTEE_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::filter_map()` rather than `Env::split("_")` because keys such as
/// `client_id` contain underscores: `MYEMTEE_IDENTITY_CLIENT_ID` must map to
/// `identity.client_id`, not `identity.client.id`. Variables outside the
/// known sections (such as `MYEMTEE_PASSWORD`) are not configuration.
fn env_provider() -> Env {
    Env::prefixed("MYEMTEE_").filter_map(|key| {
        let key = key.as_str().to_ascii_lowercase();
        ["app", "identity", "storage"].iter().find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .filter(|rest| !rest.is_empty())
                .map(|rest| format!("{section}.{rest}").into())
        })
    })
}
