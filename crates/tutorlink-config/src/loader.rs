// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tutorlink.toml` > `~/.config/tutorlink/tutorlink.toml`
//! > `/etc/tutorlink/tutorlink.toml` with environment variable overrides via
//! the `TUTORLINK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TutorlinkConfig;

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/tutorlink/tutorlink.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "tutorlink.toml";

/// Sections that env var names are split on. Keys inside a section may
/// themselves contain underscores.
const SECTIONS: &[&str] = &["server", "storage", "line", "slack", "relay"];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tutorlink/tutorlink.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tutorlink/tutorlink.toml` (system-wide)
/// 3. `~/.config/tutorlink/tutorlink.toml` (user XDG config)
/// 4. `./tutorlink.toml` (local directory)
/// 5. `TUTORLINK_*` environment variables
pub fn load_config() -> Result<TutorlinkConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<TutorlinkConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TutorlinkConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TutorlinkConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TutorlinkConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TutorlinkConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Environment provider with an explicit section-to-dot mapping.
///
/// `Env::split("_")` would turn `TUTORLINK_LINE_CHANNEL_SECRET` into
/// `line.channel.secret`; only the first segment names the section.
fn env_provider() -> Env {
    Env::prefixed("TUTORLINK_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env key to its dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
