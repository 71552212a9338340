// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HMAC-SHA256 webhook signature verification.
//!
//! Both schemes run over the exact raw request bytes, before any JSON
//! parsing. Comparison goes through [`Mac::verify_slice`], which is
//! constant-time.
//!
//! - LINE: `x-line-signature` is `base64(HMAC(channel_secret, body))`.
//! - Slack: `x-slack-signature` is `v0=` + `hex(HMAC(signing_secret, "v0:{ts}:{body}"))`,
//!   and `x-slack-request-timestamp` must be within the allowed skew of now.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Default maximum request age for the Slack scheme.
pub const DEFAULT_MAX_SKEW_SECS: u64 = 300;

/// Why a webhook request failed authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature header missing")]
    MissingSignature,

    #[error("timestamp header missing")]
    MissingTimestamp,

    #[error("signature header malformed")]
    MalformedSignature,

    #[error("timestamp header malformed")]
    MalformedTimestamp,

    #[error("signature mismatch")]
    Mismatch,

    #[error("request timestamp is {age_secs}s away from now")]
    Stale { age_secs: u64 },

    /// No secret configured and the deployment is production.
    #[error("signing secret not configured")]
    SecretNotConfigured,
}

impl From<SignatureError> for tutorlink_core::RelayError {
    fn from(err: SignatureError) -> Self {
        tutorlink_core::RelayError::Forbidden(err.to_string())
    }
}

/// Computes the LINE signature for a body. Exposed for tests and tooling.
pub fn sign_line(secret: &str, body: &[u8]) -> String {
    let mut mac = new_mac(secret);
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

/// Computes the Slack `v0=` signature for a body and timestamp.
pub fn sign_slack(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let digest = slack_mac(secret, timestamp, body).finalize().into_bytes();
    format!("v0={}", hex::encode(digest))
}

/// Checks a LINE signature. Returns `false` for anything but an exact match.
pub fn verify_line_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = BASE64.decode(signature.trim()) else {
        return false;
    };
    let mut mac = new_mac(secret);
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Checks a Slack signature and timestamp against `now` (Unix seconds).
pub fn verify_slack_signature(
    secret: &str,
    body: &[u8],
    signature: &str,
    timestamp: &str,
    now: i64,
    max_skew_secs: u64,
) -> bool {
    check_slack(secret, body, signature, timestamp, now, max_skew_secs).is_ok()
}

fn check_slack(
    secret: &str,
    body: &[u8],
    signature: &str,
    timestamp: &str,
    now: i64,
    max_skew_secs: u64,
) -> Result<(), SignatureError> {
    let ts: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::MalformedTimestamp)?;
    let age_secs = now.abs_diff(ts);
    if age_secs > max_skew_secs {
        return Err(SignatureError::Stale { age_secs });
    }

    let hex_digest = signature
        .trim()
        .strip_prefix("v0=")
        .ok_or(SignatureError::MalformedSignature)?;
    let expected = hex::decode(hex_digest).map_err(|_| SignatureError::MalformedSignature)?;

    slack_mac(secret, timestamp.trim(), body)
        .verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

fn new_mac(secret: &str) -> HmacSha256 {
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
    }
}

fn slack_mac(secret: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
    let mut mac = new_mac(secret);
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    mac
}

/// What to do when no secret is configured.
fn missing_secret(provider: &str, production: bool) -> Result<(), SignatureError> {
    if production {
        Err(SignatureError::SecretNotConfigured)
    } else {
        warn!(provider, "signing secret not configured, accepting unsigned webhook");
        Ok(())
    }
}

/// Verifier for `x-line-signature`.
#[derive(Debug, Clone)]
pub struct LineVerifier {
    secret: Option<String>,
    production: bool,
}

impl LineVerifier {
    /// A verifier with no secret rejects everything when `production` is set
    /// and accepts everything otherwise.
    pub fn new(secret: Option<String>, production: bool) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            production,
        }
    }

    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), SignatureError> {
        let Some(secret) = &self.secret else {
            return missing_secret("line", self.production);
        };
        let signature = signature.ok_or(SignatureError::MissingSignature)?;
        if verify_line_signature(secret, body, signature) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

/// Verifier for `x-slack-signature` and `x-slack-request-timestamp`.
#[derive(Debug, Clone)]
pub struct SlackVerifier {
    secret: Option<String>,
    production: bool,
    max_skew_secs: u64,
}

impl SlackVerifier {
    pub fn new(secret: Option<String>, production: bool, max_skew_secs: u64) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            production,
            max_skew_secs,
        }
    }

    /// Verifies against the current wall clock.
    pub fn verify(
        &self,
        body: &[u8],
        signature: Option<&str>,
        timestamp: Option<&str>,
    ) -> Result<(), SignatureError> {
        self.verify_at(body, signature, timestamp, chrono::Utc::now().timestamp())
    }

    /// Verifies against an explicit `now` in Unix seconds.
    pub fn verify_at(
        &self,
        body: &[u8],
        signature: Option<&str>,
        timestamp: Option<&str>,
        now: i64,
    ) -> Result<(), SignatureError> {
        let Some(secret) = &self.secret else {
            return missing_secret("slack", self.production);
        };
        let signature = signature.ok_or(SignatureError::MissingSignature)?;
        let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
        check_slack(secret, body, signature, timestamp, now, self.max_skew_secs)
    }
}
