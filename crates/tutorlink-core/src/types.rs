// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the relay crates.
//!
//! Enumerations are stored and serialized in `snake_case` so the SQLite
//! columns and JSON payloads carry the same spelling.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::RelayError;

/// External chat platform.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Channel-based consumer messaging platform.
    Line,
    /// Workspace-style team chat platform.
    Slack,
}

impl Provider {
    /// The other platform, where cross-platform relay delivers.
    pub fn other(self) -> Provider {
        match self {
            Provider::Line => Provider::Slack,
            Provider::Slack => Provider::Line,
        }
    }
}

/// Role of a party in a pairing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PartyType {
    Student,
    Tutor,
}

impl PartyType {
    /// The role on the other side of a pairing.
    pub fn counterpart(self) -> PartyType {
        match self {
            PartyType::Student => PartyType::Tutor,
            PartyType::Tutor => PartyType::Student,
        }
    }
}

/// Lifecycle state of a pairing. Only [`PairingStatus::Active`] permits relay.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PairingStatus {
    Pending,
    Active,
    Ended,
    Cancelled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Other,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Dispatch,
    Storage,
    Observability,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

// --- Persisted records ---

/// Link between one party and their identity on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAccount {
    pub id: String,
    pub provider: Provider,
    /// Platform-native user id.
    pub external_id: String,
    pub party_id: String,
    pub party_type: PartyType,
    /// Cached conversation handle for platforms that address channels, not users.
    pub conversation_handle: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Tutoring relationship between one student and one tutor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub id: String,
    pub student_id: String,
    pub tutor_id: String,
    pub status: PairingStatus,
    pub line_chat_id: Option<String>,
    pub slack_channel_id: Option<String>,
    pub started_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Pairing {
    pub fn is_active(&self) -> bool {
        self.status == PairingStatus::Active
    }

    /// Whether the given party sits on either side of this pairing.
    pub fn involves(&self, party_id: &str, party_type: PartyType) -> bool {
        match party_type {
            PartyType::Student => self.student_id == party_id,
            PartyType::Tutor => self.tutor_id == party_id,
        }
    }

    /// The party on the other side from `party_type`.
    pub fn counterpart_of(&self, party_type: PartyType) -> (&str, PartyType) {
        match party_type {
            PartyType::Student => (&self.tutor_id, PartyType::Tutor),
            PartyType::Tutor => (&self.student_id, PartyType::Student),
        }
    }

    /// The conversation handle recorded for a platform, if any.
    pub fn conversation_handle(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Line => self.line_chat_id.as_deref(),
            Provider::Slack => self.slack_channel_id.as_deref(),
        }
    }
}

/// One relayed unit of conversation. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub pairing_id: String,
    pub sender_id: String,
    pub sender_type: PartyType,
    pub content: String,
    pub kind: MessageKind,
    pub status: DeliveryStatus,
    /// Message id on the platform the message arrived from.
    pub source_message_id: Option<String>,
    /// Message id returned by the outbound send; replies correlate on it.
    pub thread_id: Option<String>,
    pub created_at: String,
    pub deleted_at: Option<String>,
}

// --- Inbound events ---

/// Content of an inbound user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    /// Publicly fetchable image URL.
    Image { url: String },
    /// Sticker, audio, location and the like.
    Unsupported { description: String },
}

impl MessageContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageContent::Text(_) => MessageKind::Text,
            MessageContent::Image { .. } => MessageKind::Image,
            MessageContent::Unsupported { .. } => MessageKind::Other,
        }
    }

    /// Text persisted in the ledger for this content.
    pub fn ledger_text(&self) -> &str {
        match self {
            MessageContent::Text(text) => text,
            MessageContent::Image { url } => url,
            MessageContent::Unsupported { description } => description,
        }
    }
}

/// Where a same-session notice can be delivered on the inbound platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyContext {
    /// Single-use reply token from the inbound event.
    Line { reply_token: String },
    /// Channel and message timestamp to thread the notice under.
    Slack { channel: String, ts: String },
    /// Platform offers no same-session reply for this event.
    Unavailable,
}

/// A user message normalized from either platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub provider: Provider,
    pub sender_external_id: String,
    pub content: MessageContent,
    pub source_message_id: Option<String>,
    /// Previously recorded correlation id this message replies to.
    pub thread_hint: Option<String>,
    pub reply: ReplyContext,
}

impl InboundMessage {
    /// Handle of the conversation the message arrived in, in the same form
    /// pairings cache it: the DM channel on Slack, the user id on LINE.
    pub fn conversation_handle(&self) -> Option<&str> {
        match (&self.provider, &self.reply) {
            (Provider::Slack, ReplyContext::Slack { channel, .. }) => Some(channel),
            (Provider::Slack, _) => None,
            (Provider::Line, _) => Some(&self.sender_external_id),
        }
    }
}

/// Why a structurally valid event was acknowledged without relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum IgnoreReason {
    /// Sent by the relay's own bot identity or another bot.
    BotIdentity,
    /// Not a message event (follow, join, reaction, ...).
    NonMessageEvent,
    /// Message from a group, room, or shared channel.
    NonUserSource,
    /// Edits, deletions, and other message subtypes.
    MessageSubtype,
}

/// Closed set of internal event variants produced by webhook normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Message(InboundMessage),
    Ignored(IgnoreReason),
}

// --- Outbound ---

/// Content an adapter can actually send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundContent {
    Text(String),
    Image { url: String },
}

impl OutboundContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            OutboundContent::Text(_) => MessageKind::Text,
            OutboundContent::Image { .. } => MessageKind::Image,
        }
    }
}

impl TryFrom<&MessageContent> for OutboundContent {
    type Error = RelayError;

    fn try_from(content: &MessageContent) -> Result<Self, Self::Error> {
        match content {
            MessageContent::Text(text) => Ok(OutboundContent::Text(text.clone())),
            MessageContent::Image { url } => Ok(OutboundContent::Image { url: url.clone() }),
            MessageContent::Unsupported { description } => {
                Err(RelayError::UnsupportedKind(description.clone()))
            }
        }
    }
}

/// A message ready for an outbound adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub content: OutboundContent,
    /// Display name of the sender, rendered by the adapter.
    pub sender_label: Option<String>,
}

/// Destination address on the outbound platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub external_id: String,
    pub conversation_handle: Option<String>,
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub platform_message_id: String,
    /// Handle the adapter addressed. Callers persist it when it differs
    /// from the one they supplied.
    pub conversation_handle: Option<String>,
}

/// Downloaded media bytes and their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaContent {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Longest platform media id the proxy accepts.
pub const MAX_MEDIA_ID_LEN: usize = 64;

/// Whether a media id is safe to forward to a platform API path.
pub fn is_valid_media_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_MEDIA_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

/// Public proxy URL under which inbound media is re-served.
pub fn media_proxy_url(
    public_base_url: &str,
    provider: Provider,
    media_id: &str,
    signature: &str,
) -> String {
    format!(
        "{}/media/{provider}/{media_id}?sig={signature}",
        public_base_url.trim_end_matches('/')
    )
}
