// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LINE adapter for the tutorlink relay.
//!
//! Normalizes inbound webhook bodies and delivers outbound messages through
//! the Messaging API. LINE addresses users directly by id, so the user id
//! doubles as the conversation handle.

pub mod client;
pub mod types;
pub mod webhook;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use tutorlink_config::model::LineConfig;
use tutorlink_core::types::{
    AdapterType, Destination, DispatchReceipt, HealthStatus, MediaContent, OutboundContent,
    OutboundMessage, Provider, ReplyContext,
};
use tutorlink_core::{DispatchAdapter, DispatchError, MediaSource, PluginAdapter, RelayError};

use crate::client::LineClient;
use crate::types::OutMessage;

pub use webhook::{NormalizeOptions, normalize_body, parse_webhook};

/// Outbound dispatch adapter for LINE.
pub struct LineDispatcher {
    client: LineClient,
    has_token: bool,
}

impl LineDispatcher {
    /// Build the adapter from config. API base URLs must satisfy the TLS policy.
    pub fn new(config: &LineConfig, request_timeout: Duration) -> Result<Self, RelayError> {
        tutorlink_security::validate_url(&config.api_base_url)?;
        tutorlink_security::validate_url(&config.data_api_base_url)?;
        let http = tutorlink_security::build_secure_client(request_timeout)?;
        let token = config.channel_access_token.clone().unwrap_or_default();
        Ok(Self {
            has_token: !token.is_empty(),
            client: LineClient::new(
                http,
                token,
                config.api_base_url.clone(),
                config.data_api_base_url.clone(),
            ),
        })
    }
}

/// Render an outbound message as LINE message objects.
///
/// Text carries the sender's name as a `Name: ` prefix. Images have no
/// caption field, so they go out bare.
pub fn render(message: &OutboundMessage) -> Vec<OutMessage> {
    match &message.content {
        OutboundContent::Text(text) => {
            let text = match &message.sender_label {
                Some(name) => format!("{name}: {text}"),
                None => text.clone(),
            };
            vec![OutMessage::Text { text }]
        }
        OutboundContent::Image { url } => vec![OutMessage::Image {
            original_content_url: url.clone(),
            preview_image_url: url.clone(),
        }],
    }
}

#[async_trait]
impl PluginAdapter for LineDispatcher {
    fn name(&self) -> &str {
        "line"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Dispatch
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        if self.has_token {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded(
                "no channel access token configured".into(),
            ))
        }
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl DispatchAdapter for LineDispatcher {
    fn provider(&self) -> Provider {
        Provider::Line
    }

    async fn send(
        &self,
        destination: &Destination,
        message: &OutboundMessage,
    ) -> Result<DispatchReceipt, DispatchError> {
        let id = self
            .client
            .push(&destination.external_id, &render(message))
            .await?;
        debug!(to = %destination.external_id, message_id = %id, "LINE push delivered");
        Ok(DispatchReceipt {
            platform_message_id: id,
            conversation_handle: Some(destination.external_id.clone()),
        })
    }

    async fn notify(&self, reply: &ReplyContext, text: &str) -> Result<(), DispatchError> {
        match reply {
            ReplyContext::Line { reply_token } => {
                self.client
                    .reply(reply_token, &[OutMessage::Text { text: text.into() }])
                    .await
            }
            ReplyContext::Unavailable => {
                debug!("no LINE reply token, notice dropped");
                Ok(())
            }
            ReplyContext::Slack { .. } => Err(DispatchError::Rejected {
                provider: Provider::Line,
                message: "Slack reply context handed to LINE adapter".into(),
            }),
        }
    }
}

#[async_trait]
impl MediaSource for LineDispatcher {
    fn provider(&self) -> Provider {
        Provider::Line
    }

    async fn fetch_media(&self, media_id: &str) -> Result<MediaContent, DispatchError> {
        self.client.get_content(media_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> LineConfig {
        LineConfig {
            channel_access_token: Some("line-token".into()),
            channel_secret: Some("secret".into()),
            api_base_url: server.uri(),
            data_api_base_url: server.uri(),
            bot_user_id: None,
        }
    }

    #[test]
    fn text_is_labelled_and_images_are_not() {
        let text = OutboundMessage {
            content: OutboundContent::Text("see you at 5".into()),
            sender_label: Some("Taro".into()),
        };
        assert_eq!(
            render(&text),
            vec![OutMessage::Text {
                text: "Taro: see you at 5".into()
            }]
        );

        let image = OutboundMessage {
            content: OutboundContent::Image {
                url: "https://relay.example/media/slack/F1".into(),
            },
            sender_label: Some("Taro".into()),
        };
        assert!(matches!(&render(&image)[0], OutMessage::Image { .. }));
    }

    #[test]
    fn plain_http_remote_api_is_refused() {
        let cfg = LineConfig {
            api_base_url: "http://api.line.me".into(),
            ..LineConfig::default()
        };
        assert!(LineDispatcher::new(&cfg, Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn send_reports_user_id_as_handle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/push"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sentMessages": [{"id": "9001"}]
            })))
            .mount(&server)
            .await;

        let dispatcher = LineDispatcher::new(&config(&server), Duration::from_secs(2)).unwrap();
        let receipt = dispatcher
            .send(
                &Destination {
                    external_id: "U1".into(),
                    conversation_handle: None,
                },
                &OutboundMessage {
                    content: OutboundContent::Text("hi".into()),
                    sender_label: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(receipt.platform_message_id, "9001");
        assert_eq!(receipt.conversation_handle.as_deref(), Some("U1"));
    }

    #[tokio::test]
    async fn notify_without_token_is_a_no_op() {
        let server = MockServer::start().await;
        let dispatcher = LineDispatcher::new(&config(&server), Duration::from_secs(2)).unwrap();
        dispatcher
            .notify(&ReplyContext::Unavailable, "hello")
            .await
            .unwrap();
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn health_degrades_without_token() {
        let cfg = LineConfig::default();
        let dispatcher = LineDispatcher::new(&cfg, Duration::from_secs(1)).unwrap();
        assert!(matches!(
            dispatcher.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }
}
