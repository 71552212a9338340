// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the tutorlink relay.

use thiserror::Error;

use crate::types::{PartyType, Provider};

/// Failure modes of an outbound dispatch adapter.
///
/// The split matters to the orchestrator: only [`DispatchError::Unavailable`]
/// is retried, everything else is reported to the sender immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Platform unreachable, timed out, rate limited, or answered 5xx.
    #[error("{provider} unavailable: {message}")]
    Unavailable { provider: Provider, message: String },

    /// Token invalid or revoked. The account needs relinking.
    #[error("{provider} rejected credentials: {message}")]
    InvalidCredentials { provider: Provider, message: String },

    /// Destination does not exist, left, or blocked the bot.
    #[error("{provider} destination not found: {message}")]
    DestinationNotFound { provider: Provider, message: String },

    /// Any other client-side rejection (malformed payload, policy).
    #[error("{provider} rejected request: {message}")]
    Rejected { provider: Provider, message: String },
}

impl DispatchError {
    /// Whether a retry with backoff has any chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Unavailable { .. })
    }

    /// The platform that produced this error.
    pub fn provider(&self) -> Provider {
        match self {
            DispatchError::Unavailable { provider, .. }
            | DispatchError::InvalidCredentials { provider, .. }
            | DispatchError::DestinationNotFound { provider, .. }
            | DispatchError::Rejected { provider, .. } => *provider,
        }
    }

    /// Classify an HTTP status from a platform API.
    pub fn from_status(provider: Provider, status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => DispatchError::InvalidCredentials { provider, message },
            404 | 410 => DispatchError::DestinationNotFound { provider, message },
            408 | 429 | 500..=599 => DispatchError::Unavailable { provider, message },
            _ => DispatchError::Rejected { provider, message },
        }
    }
}

/// The primary error type used across the relay crates.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration errors (missing secrets, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Outbound delivery failed.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Inbound request failed authentication.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Inbound payload could not be understood.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// No active external account for a platform identity.
    #[error("no active {provider} account for external id {external_id}")]
    AccountNotFound {
        provider: Provider,
        external_id: String,
    },

    /// The party has no pairing that permits relay.
    #[error("no active pairing for {party_type} {party_id}")]
    PairingNotFound {
        party_id: String,
        party_type: PartyType,
    },

    /// The other side of the pairing has not linked an account on the
    /// destination platform.
    #[error("counterpart of pairing {pairing_id} has no linked {provider} account")]
    CounterpartUnlinked {
        pairing_id: String,
        provider: Provider,
    },

    /// Message kind cannot be relayed (caller error, never a dispatch error).
    #[error("unsupported message kind: {0}")]
    UnsupportedKind(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Wrap any error as a storage failure.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        RelayError::Storage {
            source: Box::new(err),
        }
    }
}
