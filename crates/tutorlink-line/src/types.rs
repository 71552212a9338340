// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for LINE webhooks and the Messaging API.
//!
//! Only the fields the relay reads are modelled; everything else is ignored
//! on deserialization.

use serde::{Deserialize, Serialize};

/// Body of a `POST` to the webhook endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookBody {
    /// Bot user id the events were delivered to.
    #[serde(default)]
    pub destination: Option<String>,
    /// Empty for the console's "verify" request.
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    /// `message`, `follow`, `unfollow`, `join`, `postback`, ...
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub message: Option<EventMessage>,
    #[serde(default)]
    pub webhook_event_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    /// `user`, `group` or `room`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    pub id: String,
    /// `text`, `image`, `sticker`, `audio`, `video`, `location`, `file`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    /// Id of the message this one quotes, when the user replied to it.
    #[serde(default)]
    pub quoted_message_id: Option<String>,
    #[serde(default)]
    pub content_provider: Option<ContentProvider>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentProvider {
    /// `line` when the bytes are hosted by LINE, `external` otherwise.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub original_content_url: Option<String>,
}

// --- Messaging API ---

/// Outgoing message object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutMessage {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        original_content_url: String,
        preview_image_url: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct PushRequest<'a> {
    pub to: &'a str,
    pub messages: &'a [OutMessage],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest<'a> {
    pub reply_token: &'a str,
    pub messages: &'a [OutMessage],
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    #[serde(default)]
    pub sent_messages: Vec<SentMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub id: String,
    #[serde(default)]
    pub quote_token: Option<String>,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_message_serializes_in_camel_case() {
        let msg = OutMessage::Image {
            original_content_url: "https://x/a.jpg".into(),
            preview_image_url: "https://x/a.jpg".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["originalContentUrl"], "https://x/a.jpg");
        assert_eq!(json["previewImageUrl"], "https://x/a.jpg");
    }

    #[test]
    fn reply_request_uses_reply_token_key() {
        let messages = [OutMessage::Text { text: "hi".into() }];
        let req = ReplyRequest {
            reply_token: "r1",
            messages: &messages,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["replyToken"], "r1");
        assert_eq!(json["messages"][0]["type"], "text");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let body = r#"{"destination":"Ubot","events":[{"type":"follow","mode":"active",
            "source":{"type":"user","userId":"U1"},"deliveryContext":{"isRedelivery":false}}]}"#;
        let parsed: WebhookBody = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.events[0].kind, "follow");
        assert_eq!(
            parsed.events[0].source.as_ref().unwrap().user_id.as_deref(),
            Some("U1")
        );
    }
}
