// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that serde attributes cannot express:
//! secrets required in production, retry bounds that must fit inside the
//! webhook acknowledgement deadline, and well-formed URLs.

use crate::diagnostic::ConfigError;
use crate::model::TutorlinkConfig;

/// The workspace platform retries a webhook it has not seen acknowledged
/// within this many milliseconds.
pub const WEBHOOK_ACK_DEADLINE_MS: u64 = 3000;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure rather than stopping at the first.
pub fn validate_config(config: &TutorlinkConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    }

    if let Some(base) = &config.server.public_base_url
        && let Err(e) = url::Url::parse(base)
    {
        errors.push(ConfigError::validation(format!(
            "server.public_base_url `{base}` is not a valid URL: {e}"
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    for (key, value) in [
        ("line.api_base_url", &config.line.api_base_url),
        ("line.data_api_base_url", &config.line.data_api_base_url),
        ("slack.api_base_url", &config.slack.api_base_url),
    ] {
        if url::Url::parse(value).is_err() {
            errors.push(ConfigError::validation(format!(
                "{key} `{value}` is not a valid URL"
            )));
        }
    }

    if config.server.environment.is_production() {
        for (key, value) in [
            ("line.channel_secret", &config.line.channel_secret),
            ("line.channel_access_token", &config.line.channel_access_token),
            ("slack.signing_secret", &config.slack.signing_secret),
            ("slack.bot_token", &config.slack.bot_token),
            ("server.media_signing_key", &config.server.media_signing_key),
        ] {
            if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
                errors.push(ConfigError::validation(format!(
                    "{key} is required when server.environment is production"
                )));
            }
        }
    }

    if config.slack.max_timestamp_skew_secs == 0 {
        errors.push(ConfigError::validation(
            "slack.max_timestamp_skew_secs must be at least 1",
        ));
    }

    let relay = &config.relay;
    if relay.max_attempts < 1 {
        errors.push(ConfigError::validation("relay.max_attempts must be at least 1"));
    }
    if relay.backoff_multiplier < 1 {
        errors.push(ConfigError::validation(
            "relay.backoff_multiplier must be at least 1",
        ));
    }
    if relay.processing_budget_ms >= WEBHOOK_ACK_DEADLINE_MS {
        errors.push(ConfigError::validation(format!(
            "relay.processing_budget_ms must be below {WEBHOOK_ACK_DEADLINE_MS}, got {}",
            relay.processing_budget_ms
        )));
    }
    if relay.initial_backoff_ms > relay.processing_budget_ms
        || relay.max_backoff_ms > relay.processing_budget_ms
    {
        errors.push(ConfigError::validation(format!(
            "relay backoff ({}ms initial, {}ms max) must not exceed relay.processing_budget_ms ({}ms)",
            relay.initial_backoff_ms, relay.max_backoff_ms, relay.processing_budget_ms
        )));
    }
    if relay.request_timeout_ms == 0 {
        errors.push(ConfigError::validation(
            "relay.request_timeout_ms must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
