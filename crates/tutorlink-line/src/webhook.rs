// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook parsing and normalization into [`InboundEvent`]s.
//!
//! Only one-to-one messages from users reach the relay. Group and room
//! traffic, non-message events, and anything the bot itself sent are
//! acknowledged and dropped.

use tracing::debug;
use tutorlink_core::RelayError;
use tutorlink_core::types::{
    IgnoreReason, InboundEvent, InboundMessage, MessageContent, Provider, ReplyContext,
    is_valid_media_id,
};
use tutorlink_security::MediaLinks;

use crate::types::{EventMessage, WebhookBody, WebhookEvent};

/// Settings that shape normalization.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// The bot's own user id.
    pub bot_user_id: Option<String>,
    /// Signed proxy links for inbound images. Without them images cannot
    /// be relayed.
    pub media_links: Option<MediaLinks>,
}

/// Parse a verified raw body.
pub fn parse_webhook(body: &[u8]) -> Result<WebhookBody, RelayError> {
    serde_json::from_slice(body).map_err(|e| RelayError::Malformed(format!("LINE webhook: {e}")))
}

/// Normalize every event in a webhook body, preserving order.
pub fn normalize_body(body: &WebhookBody, options: &NormalizeOptions) -> Vec<InboundEvent> {
    body.events
        .iter()
        .map(|event| normalize_event(event, options))
        .collect()
}

/// Normalize one webhook event.
pub fn normalize_event(event: &WebhookEvent, options: &NormalizeOptions) -> InboundEvent {
    if event.kind != "message" {
        debug!(kind = %event.kind, "ignoring non-message LINE event");
        return InboundEvent::Ignored(IgnoreReason::NonMessageEvent);
    }

    let Some(source) = &event.source else {
        return InboundEvent::Ignored(IgnoreReason::NonUserSource);
    };
    let user_id = match (source.kind.as_str(), &source.user_id) {
        ("user", Some(user_id)) => user_id,
        _ => {
            debug!(source = %source.kind, "ignoring LINE message from non-user source");
            return InboundEvent::Ignored(IgnoreReason::NonUserSource);
        }
    };

    if options.bot_user_id.as_deref() == Some(user_id.as_str()) {
        return InboundEvent::Ignored(IgnoreReason::BotIdentity);
    }

    let Some(message) = &event.message else {
        return InboundEvent::Ignored(IgnoreReason::NonMessageEvent);
    };

    let reply = match &event.reply_token {
        Some(token) if !token.is_empty() => ReplyContext::Line {
            reply_token: token.clone(),
        },
        _ => ReplyContext::Unavailable,
    };

    InboundEvent::Message(InboundMessage {
        provider: Provider::Line,
        sender_external_id: user_id.clone(),
        content: extract_content(message, options),
        source_message_id: Some(message.id.clone()),
        thread_hint: message.quoted_message_id.clone(),
        reply,
    })
}

fn extract_content(message: &EventMessage, options: &NormalizeOptions) -> MessageContent {
    match message.kind.as_str() {
        "text" => MessageContent::Text(message.text.clone().unwrap_or_default()),
        "image" => image_content(message, options),
        other => MessageContent::Unsupported {
            description: other.to_string(),
        },
    }
}

fn image_content(message: &EventMessage, options: &NormalizeOptions) -> MessageContent {
    // Externally hosted images are already public.
    if let Some(provider) = &message.content_provider
        && provider.kind == "external"
        && let Some(url) = &provider.original_content_url
    {
        return MessageContent::Image { url: url.clone() };
    }

    match &options.media_links {
        Some(links) if is_valid_media_id(&message.id) => MessageContent::Image {
            url: links.url(Provider::Line, &message.id),
        },
        _ => MessageContent::Unsupported {
            description: "image".to_string(),
        },
    }
}
