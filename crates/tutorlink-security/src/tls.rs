// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TLS policy for outbound platform API connections.
//!
//! Provides a reqwest client builder with a TLS 1.2 minimum and a URL check
//! that refuses plain HTTP to anything but loopback.

use std::time::Duration;

use tracing::error;
use tutorlink_core::RelayError;

/// Build the HTTP client shared by a platform adapter.
///
/// `timeout` bounds a single request so one slow call cannot consume the
/// whole per-event processing budget.
pub fn build_secure_client(timeout: Duration) -> Result<reqwest::Client, RelayError> {
    reqwest::Client::builder()
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!("tutorlink/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            error!("failed to build secure HTTP client: {e}");
            RelayError::Config(format!("failed to build secure HTTP client: {e}"))
        })
}

/// Validate a platform API base URL against the TLS policy.
///
/// Loopback URLs may use any scheme; everything else must be HTTPS.
pub fn validate_url(url: &str) -> Result<(), RelayError> {
    let parsed =
        url::Url::parse(url).map_err(|e| RelayError::Config(format!("invalid URL `{url}`: {e}")))?;

    if is_localhost(parsed.host_str().unwrap_or("")) {
        return Ok(());
    }

    if parsed.scheme() != "https" {
        error!(url = %url, "TLS required for remote connections");
        return Err(RelayError::Config(format!(
            "TLS required for remote API `{url}`, use https"
        )));
    }

    Ok(())
}

/// Check if a host refers to the loopback interface.
pub fn is_localhost(host: &str) -> bool {
    matches!(host, "::1" | "localhost" | "[::1]") || host.starts_with("127.")
}
