// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the tutorlink relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level tutorlink configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TutorlinkConfig {
    /// HTTP server and runtime environment.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// LINE Messaging API credentials.
    #[serde(default)]
    pub line: LineConfig,

    /// Slack Web API credentials.
    #[serde(default)]
    pub slack: SlackConfig,

    /// Retry, budget and pairing-resolution settings.
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Deployment environment. Production fails closed on missing secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => f.write_str("production"),
            Environment::Development => f.write_str("development"),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default)]
    pub environment: Environment,

    /// Address to bind the webhook listener to.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL, used to build media proxy URLs.
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Key for the signatures that media proxy URLs carry.
    #[serde(default)]
    pub media_signing_key: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            host: default_host(),
            port: default_port(),
            public_base_url: None,
            media_signing_key: None,
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("tutorlink").join("tutorlink.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("tutorlink.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// LINE Messaging API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LineConfig {
    /// Long-lived channel access token used for push/reply and content fetches.
    #[serde(default)]
    pub channel_access_token: Option<String>,

    /// Channel secret that keys the `x-line-signature` HMAC.
    #[serde(default)]
    pub channel_secret: Option<String>,

    #[serde(default = "default_line_api_base_url")]
    pub api_base_url: String,

    /// Host serving message content (images).
    #[serde(default = "default_line_data_api_base_url")]
    pub data_api_base_url: String,

    /// The bot's own user id. Events from it are dropped.
    #[serde(default)]
    pub bot_user_id: Option<String>,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_access_token: None,
            channel_secret: None,
            api_base_url: default_line_api_base_url(),
            data_api_base_url: default_line_data_api_base_url(),
            bot_user_id: None,
        }
    }
}

fn default_line_api_base_url() -> String {
    "https://api.line.me".to_string()
}

fn default_line_data_api_base_url() -> String {
    "https://api-data.line.me".to_string()
}

/// Slack Web API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`).
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Signing secret that keys the `x-slack-signature` HMAC.
    #[serde(default)]
    pub signing_secret: Option<String>,

    #[serde(default = "default_slack_api_base_url")]
    pub api_base_url: String,

    /// The bot's own user id. Events from it are dropped.
    #[serde(default)]
    pub bot_user_id: Option<String>,

    /// Maximum age of a signed request before it is treated as a replay.
    #[serde(default = "default_max_timestamp_skew_secs")]
    pub max_timestamp_skew_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            signing_secret: None,
            api_base_url: default_slack_api_base_url(),
            bot_user_id: None,
            max_timestamp_skew_secs: default_max_timestamp_skew_secs(),
        }
    }
}

fn default_slack_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_max_timestamp_skew_secs() -> u64 {
    300
}

/// Rule used when no thread hint pins a reply to a pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingFallbackMode {
    /// Pick the most recently started active pairing.
    #[default]
    MostRecentActive,
    /// Refuse to guess when more than one pairing is active.
    RejectAmbiguous,
}

/// Relay orchestration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Total dispatch attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Wall-clock budget for one inbound event, from receipt to ledger write.
    #[serde(default = "default_processing_budget_ms")]
    pub processing_budget_ms: u64,

    /// Timeout for a single outbound HTTP request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub pairing_fallback: PairingFallbackMode,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            processing_budget_ms: default_processing_budget_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            pairing_fallback: PairingFallbackMode::default(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_backoff_multiplier() -> u32 {
    3
}

fn default_max_backoff_ms() -> u64 {
    1800
}

fn default_processing_budget_ms() -> u64 {
    2500
}

fn default_request_timeout_ms() -> u64 {
    2000
}
