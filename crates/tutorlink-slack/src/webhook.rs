// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events API parsing and normalization into [`InboundEvent`]s.

use serde::Serialize;
use slack_morphism::prelude::{SlackEventCallbackBody, SlackMessageEvent, SlackPushEvent};
use tracing::debug;
use tutorlink_core::RelayError;
use tutorlink_core::types::{
    IgnoreReason, InboundEvent, InboundMessage, MessageContent, Provider, ReplyContext,
    is_valid_media_id,
};
use tutorlink_security::MediaLinks;

/// Message subtypes that still carry a user-authored message.
const RELAYED_SUBTYPES: &[&str] = &["file_share", "thread_broadcast"];

#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// The bot's own user id.
    pub bot_user_id: Option<String>,
    pub media_links: Option<MediaLinks>,
}

/// A verified Events API request body.
#[derive(Debug)]
pub enum SlackEnvelope {
    Push(Box<SlackPushEvent>),
    /// Valid JSON the event model does not cover, such as event types this
    /// relay never subscribes to.
    Unrecognized,
}

/// Return the handshake challenge if `body` is a `url_verification` request.
///
/// Runs before signature checks, since Slack does not sign the handshake.
/// Anything that is not JSON, or not that type, yields `None`.
pub fn url_verification_challenge(body: &[u8]) -> Option<String> {
    match serde_json::from_slice::<SlackPushEvent>(body) {
        Ok(SlackPushEvent::UrlVerification(verification)) => Some(verification.challenge),
        _ => None,
    }
}

/// Parse a request body. Only bodies that are not a JSON object are
/// malformed; unknown event shapes are acknowledged and ignored.
pub fn parse_envelope(body: &[u8]) -> Result<SlackEnvelope, RelayError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| RelayError::Malformed(format!("Slack event: {e}")))?;
    if !value.is_object() {
        return Err(RelayError::Malformed("Slack event is not an object".into()));
    }
    match serde_json::from_value::<SlackPushEvent>(value) {
        Ok(event) => Ok(SlackEnvelope::Push(Box::new(event))),
        Err(e) => {
            debug!(error = %e, "unrecognized Slack event shape");
            Ok(SlackEnvelope::Unrecognized)
        }
    }
}

/// Normalize a verified envelope.
pub fn normalize_envelope(envelope: &SlackEnvelope, options: &NormalizeOptions) -> InboundEvent {
    let SlackEnvelope::Push(push) = envelope else {
        return InboundEvent::Ignored(IgnoreReason::NonMessageEvent);
    };
    match push.as_ref() {
        SlackPushEvent::EventCallback(callback) => match &callback.event {
            SlackEventCallbackBody::Message(message) => normalize_message(message, options),
            _ => {
                debug!("ignoring non-message Slack event");
                InboundEvent::Ignored(IgnoreReason::NonMessageEvent)
            }
        },
        _ => InboundEvent::Ignored(IgnoreReason::NonMessageEvent),
    }
}

pub fn normalize_message(event: &SlackMessageEvent, options: &NormalizeOptions) -> InboundEvent {
    let subtype = event.subtype.as_ref().and_then(wire_name);

    if event.sender.bot_id.is_some() || subtype.as_deref() == Some("bot_message") {
        return InboundEvent::Ignored(IgnoreReason::BotIdentity);
    }

    if let Some(subtype) = &subtype
        && !RELAYED_SUBTYPES.contains(&subtype.as_str())
    {
        debug!(subtype = %subtype, "ignoring Slack message subtype");
        return InboundEvent::Ignored(IgnoreReason::MessageSubtype);
    }

    let (Some(user), Some(channel)) = (&event.sender.user, &event.origin.channel) else {
        return InboundEvent::Ignored(IgnoreReason::NonUserSource);
    };
    let user = &user.0;
    let ts = &event.origin.ts.0;

    if options.bot_user_id.as_deref() == Some(user.as_str()) {
        return InboundEvent::Ignored(IgnoreReason::BotIdentity);
    }

    if let Some(channel_type) = event.origin.channel_type.as_ref().and_then(wire_name)
        && channel_type != "im"
    {
        debug!(channel_type = %channel_type, "ignoring Slack message outside a DM");
        return InboundEvent::Ignored(IgnoreReason::NonUserSource);
    }

    // A reply inside a thread carries the root's ts, which is the id the
    // relay recorded when it posted the root.
    let thread_ts = event.origin.thread_ts.as_ref().map(|root| root.0.clone());
    let thread_hint = thread_ts.clone().filter(|root| root != ts);

    InboundEvent::Message(InboundMessage {
        provider: Provider::Slack,
        sender_external_id: user.clone(),
        content: extract_content(event, options),
        source_message_id: Some(ts.clone()),
        thread_hint,
        reply: ReplyContext::Slack {
            channel: channel.0.clone(),
            ts: thread_ts.unwrap_or_else(|| ts.clone()),
        },
    })
}

fn extract_content(event: &SlackMessageEvent, options: &NormalizeOptions) -> MessageContent {
    let content = event.content.as_ref();

    if let Some(file) = content
        .and_then(|c| c.files.as_ref())
        .and_then(|files| files.first())
    {
        let mimetype = file.mimetype.as_ref().and_then(wire_name);
        let is_image = mimetype.as_deref().is_some_and(|m| m.starts_with("image/"));
        return match &options.media_links {
            Some(links) if is_image && is_valid_media_id(&file.id.0) => MessageContent::Image {
                url: links.url(Provider::Slack, &file.id.0),
            },
            _ => MessageContent::Unsupported {
                description: mimetype.unwrap_or_else(|| "file".into()),
            },
        };
    }

    MessageContent::Text(content.and_then(|c| c.text.clone()).unwrap_or_default())
}

/// The string a value takes on the wire, for enum and newtype fields that
/// are only compared by name.
fn wire_name<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(name)) => Some(name),
        _ => None,
    }
}
