// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Security boundary for the tutorlink relay.
//!
//! Provides webhook signature verification for both platforms, signed media
//! proxy links, the TLS policy for outbound API clients, and secret
//! redaction for log output.

pub mod media;
pub mod redact;
pub mod signature;
pub mod tls;

pub use media::{MediaLinks, MediaSigner};
pub use redact::{RedactingWriter, SecretList, redact};
pub use signature::{LineVerifier, SignatureError, SlackVerifier};
pub use tls::{build_secure_client, is_localhost, validate_url};
