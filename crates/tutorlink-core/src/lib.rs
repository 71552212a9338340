// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the tutorlink relay.
//!
//! This crate provides the trait definitions, error types, and domain types
//! shared by the relay, storage, gateway and platform adapter crates.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{DispatchError, RelayError};
pub use types::{AdapterType, HealthStatus, PartyType, Provider};

pub use traits::{DispatchAdapter, MediaSource, PluginAdapter, RelayStore};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    fn pairing() -> Pairing {
        Pairing {
            id: "p1".into(),
            student_id: "s1".into(),
            tutor_id: "t1".into(),
            status: PairingStatus::Active,
            line_chat_id: None,
            slack_channel_id: Some("D123".into()),
            started_at: Some("2026-01-01T00:00:00.000Z".into()),
            created_at: "2026-01-01T00:00:00.000Z".into(),
            updated_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn enums_round_trip_through_strings() {
        use std::str::FromStr;

        for provider in [Provider::Line, Provider::Slack] {
            let s = provider.to_string();
            assert_eq!(Provider::from_str(&s).unwrap(), provider);
        }
        assert_eq!(PartyType::Student.to_string(), "student");
        assert_eq!(PairingStatus::from_str("active").unwrap(), PairingStatus::Active);
        assert_eq!(DeliveryStatus::Failed.to_string(), "failed");
        assert_eq!(MessageKind::from_str("image").unwrap(), MessageKind::Image);
    }

    #[test]
    fn provider_serializes_snake_case() {
        let json = serde_json::to_string(&Provider::Slack).unwrap();
        assert_eq!(json, "\"slack\"");
    }

    #[test]
    fn pairing_counterpart_and_involvement() {
        let p = pairing();
        assert!(p.involves("s1", PartyType::Student));
        assert!(!p.involves("s1", PartyType::Tutor));
        assert_eq!(p.counterpart_of(PartyType::Student), ("t1", PartyType::Tutor));
        assert_eq!(p.counterpart_of(PartyType::Tutor), ("s1", PartyType::Student));
        assert_eq!(p.conversation_handle(Provider::Slack), Some("D123"));
        assert_eq!(p.conversation_handle(Provider::Line), None);
    }

    #[test]
    fn unsupported_content_is_not_outbound() {
        let sticker = MessageContent::Unsupported {
            description: "sticker".into(),
        };
        assert_eq!(sticker.kind(), MessageKind::Other);
        let err = OutboundContent::try_from(&sticker).unwrap_err();
        assert!(matches!(err, RelayError::UnsupportedKind(_)));

        let image = MessageContent::Image {
            url: "https://relay.example/media/line/1".into(),
        };
        let out = OutboundContent::try_from(&image).unwrap();
        assert_eq!(out.kind(), MessageKind::Image);
    }

    #[test]
    fn media_ids_and_urls() {
        assert!(is_valid_media_id("461230966842064897"));
        assert!(is_valid_media_id("F0A1B2C3.jpg_x-1"));
        assert!(!is_valid_media_id(""));
        assert!(!is_valid_media_id("../etc/passwd"));
        assert!(!is_valid_media_id("a/b"));
        assert!(!is_valid_media_id(&"a".repeat(65)));
        assert!(is_valid_media_id(&"a".repeat(64)));
        assert_eq!(
            media_proxy_url("https://relay.example/", Provider::Line, "42", "ab12"),
            "https://relay.example/media/line/42?sig=ab12"
        );
    }

    #[test]
    fn inbound_conversation_handle_per_platform() {
        let mut msg = InboundMessage {
            provider: Provider::Slack,
            sender_external_id: "W1".into(),
            content: MessageContent::Text("hi".into()),
            source_message_id: None,
            thread_hint: None,
            reply: ReplyContext::Slack {
                channel: "D9".into(),
                ts: "1.1".into(),
            },
        };
        assert_eq!(msg.conversation_handle(), Some("D9"));
        msg.reply = ReplyContext::Unavailable;
        assert_eq!(msg.conversation_handle(), None);

        msg.provider = Provider::Line;
        msg.sender_external_id = "U1".into();
        assert_eq!(msg.conversation_handle(), Some("U1"));
        assert_eq!(Provider::Line.other(), Provider::Slack);
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_dispatch_adapter<T: DispatchAdapter>() {}
        fn _assert_relay_store<T: RelayStore>() {}
        fn _assert_media_source<T: MediaSource>() {}
    }
}
