// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack adapter for the tutorlink relay.
//!
//! Slack addresses DM channels rather than users, so delivery opens the
//! conversation with `conversations.open` when no channel is cached and
//! reports the channel back in the receipt for the caller to persist.

pub mod client;
pub mod media;
pub mod webhook;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use slack_morphism::prelude::{SlackBlock, SlackMessageContent};
use tokio::sync::RwLock;
use tracing::{debug, info};
use tutorlink_config::model::SlackConfig;
use tutorlink_core::types::{
    AdapterType, Destination, DispatchReceipt, HealthStatus, MediaContent, OutboundContent,
    OutboundMessage, Provider, ReplyContext,
};
use tutorlink_core::{DispatchAdapter, DispatchError, MediaSource, PluginAdapter, RelayError};

use crate::client::{PostedMessage, SessionApi, SlackWebApi};
use crate::media::FileDownloader;

pub use webhook::{
    NormalizeOptions, SlackEnvelope, normalize_envelope, parse_envelope,
    url_verification_challenge,
};

/// Outbound dispatch adapter for Slack.
pub struct SlackDispatcher {
    api: Arc<dyn SlackWebApi>,
    files: FileDownloader,
    has_token: bool,
    /// DM channels opened for users whose delivery has not yet succeeded,
    /// so retries of the same send do not reopen the conversation.
    opened: RwLock<HashMap<String, String>>,
}

impl SlackDispatcher {
    pub fn new(config: &SlackConfig, request_timeout: Duration) -> Result<Self, RelayError> {
        tutorlink_security::validate_url(&config.api_base_url)?;
        let http = tutorlink_security::build_secure_client(request_timeout)?;
        let token = config.bot_token.clone().unwrap_or_default();
        let api = SessionApi::new(&config.api_base_url, token.clone(), request_timeout)?;
        Ok(Self::with_api(
            Arc::new(api),
            FileDownloader::new(http, token.clone(), &config.api_base_url),
            !token.is_empty(),
        ))
    }

    pub fn with_api(api: Arc<dyn SlackWebApi>, files: FileDownloader, has_token: bool) -> Self {
        Self {
            api,
            files,
            has_token,
            opened: RwLock::new(HashMap::new()),
        }
    }

    async fn open(&self, user_id: &str) -> Result<String, DispatchError> {
        let channel = self.api.open_conversation(user_id).await?;
        debug!(user = %user_id, channel = %channel, "opened Slack DM");
        self.opened
            .write()
            .await
            .insert(user_id.to_string(), channel.clone());
        Ok(channel)
    }

    async fn post(
        &self,
        channel: &str,
        message: &OutboundMessage,
    ) -> Result<PostedMessage, DispatchError> {
        self.api.post_message(channel, render(message), None).await
    }
}

/// Render an outbound message as `chat.postMessage` content.
///
/// Text is prefixed with the sender's name in bold. Images go out as an image
/// block whose alt text is the sender's name, with fallback text for
/// notifications.
pub fn render(message: &OutboundMessage) -> SlackMessageContent {
    match &message.content {
        OutboundContent::Text(text) => {
            let text = match &message.sender_label {
                Some(name) => format!("*{name}*: {text}"),
                None => text.clone(),
            };
            SlackMessageContent::new().with_text(text)
        }
        OutboundContent::Image { url } => {
            let (text, alt_text) = match &message.sender_label {
                Some(name) => (format!("*{name}* sent an image"), name.clone()),
                None => ("Image".to_string(), "image".to_string()),
            };
            let content = SlackMessageContent::new().with_text(text);
            match image_block(url, &alt_text) {
                Some(block) => content.with_blocks(vec![block]),
                None => content,
            }
        }
    }
}

fn image_block(url: &str, alt_text: &str) -> Option<SlackBlock> {
    let block = serde_json::json!({
        "type": "image",
        "image_url": url,
        "alt_text": alt_text,
    });
    match serde_json::from_value(block) {
        Ok(block) => Some(block),
        Err(e) => {
            debug!(error = %e, "image block rejected, sending text only");
            None
        }
    }
}

#[async_trait]
impl PluginAdapter for SlackDispatcher {
    fn name(&self) -> &str {
        "slack"
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
            Ok(HealthStatus::Degraded("no bot token configured".into()))
        }
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl DispatchAdapter for SlackDispatcher {
    fn provider(&self) -> Provider {
        Provider::Slack
    }

    async fn send(
        &self,
        destination: &Destination,
        message: &OutboundMessage,
    ) -> Result<DispatchReceipt, DispatchError> {
        let user = destination.external_id.as_str();
        let known = match &destination.conversation_handle {
            Some(channel) => Some(channel.clone()),
            None => self.opened.read().await.get(user).cloned(),
        };

        let posted = match known {
            Some(channel) => match self.post(&channel, message).await {
                Err(DispatchError::DestinationNotFound { .. }) => {
                    // Known channel went stale; reopen the DM once.
                    info!(user = %user, stale = %channel, "reopening Slack DM");
                    self.opened.write().await.remove(user);
                    let channel = self.open(user).await?;
                    self.post(&channel, message).await?
                }
                other => other?,
            },
            None => {
                let channel = self.open(user).await?;
                self.post(&channel, message).await?
            }
        };

        self.opened.write().await.remove(user);
        debug!(channel = %posted.channel, ts = %posted.ts, "Slack message delivered");
        Ok(DispatchReceipt {
            platform_message_id: posted.ts,
            conversation_handle: Some(posted.channel),
        })
    }

    async fn notify(&self, reply: &ReplyContext, text: &str) -> Result<(), DispatchError> {
        match reply {
            ReplyContext::Slack { channel, ts } => self
                .api
                .post_message(
                    channel,
                    SlackMessageContent::new().with_text(text.to_string()),
                    Some(ts),
                )
                .await
                .map(|_| ()),
            ReplyContext::Unavailable => {
                debug!("no Slack reply context, notice dropped");
                Ok(())
            }
            ReplyContext::Line { .. } => Err(DispatchError::Rejected {
                provider: Provider::Slack,
                message: "LINE reply context handed to Slack adapter".into(),
            }),
        }
    }
}

#[async_trait]
impl MediaSource for SlackDispatcher {
    fn provider(&self) -> Provider {
        Provider::Slack
    }

    async fn fetch_media(&self, media_id: &str) -> Result<MediaContent, DispatchError> {
        self.files.download(media_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Post {
        channel: String,
        content: serde_json::Value,
        thread_ts: Option<String>,
    }

    /// Scripted Web API: opens return `channel`, posts fail with queued
    /// errors before succeeding.
    #[derive(Default)]
    struct FakeApi {
        channel: String,
        opens: Mutex<u32>,
        failures: Mutex<VecDeque<DispatchError>>,
        posts: Mutex<Vec<Post>>,
    }

    impl FakeApi {
        fn opening(channel: &str) -> Self {
            Self {
                channel: channel.into(),
                ..Self::default()
            }
        }

        fn fail_next(&self, err: DispatchError) {
            self.failures.lock().unwrap().push_back(err);
        }

        fn opens(&self) -> u32 {
            *self.opens.lock().unwrap()
        }

        fn posts(&self) -> Vec<Post> {
            self.posts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SlackWebApi for FakeApi {
        async fn open_conversation(&self, _user_id: &str) -> Result<String, DispatchError> {
            *self.opens.lock().unwrap() += 1;
            Ok(self.channel.clone())
        }

        async fn post_message(
            &self,
            channel: &str,
            content: SlackMessageContent,
            thread_ts: Option<&str>,
        ) -> Result<PostedMessage, DispatchError> {
            self.posts.lock().unwrap().push(Post {
                channel: channel.into(),
                content: serde_json::to_value(&content).unwrap(),
                thread_ts: thread_ts.map(str::to_string),
            });
            if let Some(err) = self.failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            Ok(PostedMessage {
                channel: channel.into(),
                ts: format!("1690000000.00010{}", self.posts.lock().unwrap().len()),
            })
        }
    }

    fn dispatcher(api: Arc<FakeApi>) -> SlackDispatcher {
        let files = FileDownloader::new(reqwest::Client::new(), "xoxb-test".into(), "http://127.0.0.1:9");
        SlackDispatcher::with_api(api, files, true)
    }

    fn text(body: &str) -> OutboundMessage {
        OutboundMessage {
            content: OutboundContent::Text(body.into()),
            sender_label: Some("Sora".into()),
        }
    }

    fn to(handle: Option<&str>) -> Destination {
        Destination {
            external_id: "W1".into(),
            conversation_handle: handle.map(str::to_string),
        }
    }

    fn unavailable() -> DispatchError {
        DispatchError::Unavailable {
            provider: Provider::Slack,
            message: "chat.postMessage returned 503".into(),
        }
    }

    #[test]
    fn text_gets_bold_label() {
        let content = serde_json::to_value(render(&text("Hello"))).unwrap();
        assert_eq!(content["text"], "*Sora*: Hello");
        assert!(content.get("blocks").is_none_or(|b| b.is_null()));
    }

    #[test]
    fn image_becomes_block() {
        let content = serde_json::to_value(render(&OutboundMessage {
            content: OutboundContent::Image {
                url: "https://relay.example/media/line/777?sig=ab12".into(),
            },
            sender_label: Some("Sora".into()),
        }))
        .unwrap();
        assert_eq!(content["text"], "*Sora* sent an image");
        assert_eq!(content["blocks"][0]["type"], "image");
        assert_eq!(
            content["blocks"][0]["image_url"],
            "https://relay.example/media/line/777?sig=ab12"
        );
        assert_eq!(content["blocks"][0]["alt_text"], "Sora");
    }

    #[tokio::test]
    async fn send_opens_dm_when_no_handle_cached() {
        let api = Arc::new(FakeApi::opening("D9"));
        let receipt = dispatcher(api.clone())
            .send(&to(None), &text("Hello"))
            .await
            .unwrap();

        assert_eq!(api.opens(), 1);
        assert_eq!(receipt.conversation_handle.as_deref(), Some("D9"));
        assert_eq!(receipt.platform_message_id, "1690000000.000101");
        let posts = api.posts();
        assert_eq!(posts[0].channel, "D9");
        assert_eq!(posts[0].content["text"], "*Sora*: Hello");
        assert_eq!(posts[0].thread_ts, None);
    }

    #[tokio::test]
    async fn cached_handle_skips_open() {
        let api = Arc::new(FakeApi::opening("D9"));
        let receipt = dispatcher(api.clone())
            .send(&to(Some("D1")), &text("Hello"))
            .await
            .unwrap();

        assert_eq!(api.opens(), 0);
        assert_eq!(receipt.conversation_handle.as_deref(), Some("D1"));
    }

    #[tokio::test]
    async fn stale_handle_is_reopened_once() {
        let api = Arc::new(FakeApi::opening("DNEW"));
        api.fail_next(DispatchError::DestinationNotFound {
            provider: Provider::Slack,
            message: "chat.postMessage: channel_not_found".into(),
        });

        let receipt = dispatcher(api.clone())
            .send(&to(Some("DOLD")), &text("Hello"))
            .await
            .unwrap();

        assert_eq!(api.opens(), 1);
        let channels: Vec<String> = api.posts().into_iter().map(|p| p.channel).collect();
        assert_eq!(channels, vec!["DOLD", "DNEW"]);
        assert_eq!(receipt.conversation_handle.as_deref(), Some("DNEW"));
    }

    #[tokio::test]
    async fn retried_send_reuses_the_opened_channel() {
        let api = Arc::new(FakeApi::opening("D9"));
        api.fail_next(unavailable());
        let slack = dispatcher(api.clone());

        let first = slack.send(&to(None), &text("Hello")).await.unwrap_err();
        assert!(first.is_retryable());
        let receipt = slack.send(&to(None), &text("Hello")).await.unwrap();

        assert_eq!(api.opens(), 1);
        assert_eq!(receipt.conversation_handle.as_deref(), Some("D9"));
        assert!(api.posts().iter().all(|p| p.channel == "D9"));
    }

    #[tokio::test]
    async fn delivered_channel_is_not_held_afterwards() {
        let api = Arc::new(FakeApi::opening("D9"));
        let slack = dispatcher(api.clone());

        slack.send(&to(None), &text("one")).await.unwrap();
        slack.send(&to(None), &text("two")).await.unwrap();

        assert_eq!(api.opens(), 2);
    }

    #[tokio::test]
    async fn notify_threads_under_inbound_message() {
        let api = Arc::new(FakeApi::opening("D9"));
        dispatcher(api.clone())
            .notify(
                &ReplyContext::Slack {
                    channel: "D1".into(),
                    ts: "1.5".into(),
                },
                "not delivered",
            )
            .await
            .unwrap();

        let posts = api.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].channel, "D1");
        assert_eq!(posts[0].thread_ts.as_deref(), Some("1.5"));
        assert_eq!(posts[0].content["text"], "not delivered");
    }

    #[tokio::test]
    async fn unavailable_context_drops_notice() {
        let api = Arc::new(FakeApi::opening("D9"));
        dispatcher(api.clone())
            .notify(&ReplyContext::Unavailable, "x")
            .await
            .unwrap();
        assert!(api.posts().is_empty());
    }

    #[tokio::test]
    async fn line_context_is_rejected() {
        let api = Arc::new(FakeApi::opening("D9"));
        let err = dispatcher(api)
            .notify(
                &ReplyContext::Line {
                    reply_token: "rt".into(),
                },
                "x",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Rejected { .. }));
    }

    #[tokio::test]
    async fn health_reflects_token() {
        let files = FileDownloader::new(reqwest::Client::new(), String::new(), "http://127.0.0.1:9");
        let slack = SlackDispatcher::with_api(Arc::new(FakeApi::default()), files, false);
        assert!(matches!(
            slack.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }
}
