// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock dispatch adapter for deterministic testing.
//!
//! `MockDispatcher` implements `DispatchAdapter` with scripted send results
//! and captures every send and notice for assertion in tests. It also serves
//! media registered with [`MockDispatcher::add_media`].

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use tutorlink_core::types::{
    AdapterType, Destination, DispatchReceipt, HealthStatus, MediaContent, OutboundMessage,
    Provider, ReplyContext,
};
use tutorlink_core::{DispatchAdapter, DispatchError, MediaSource, PluginAdapter, RelayError};

/// Next response of a scripted send.
#[derive(Debug, Clone)]
enum Scripted {
    Id(String),
    Error(DispatchError),
}

/// A captured call to `send()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub destination: Destination,
    pub message: OutboundMessage,
}

/// A captured call to `notify()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotice {
    pub reply: ReplyContext,
    pub text: String,
}

/// A mock outbound adapter for one provider.
///
/// With nothing scripted, `send()` succeeds with ids `"{provider}-msg-{n}"`.
/// The reported handle mimics the platform: the user id on LINE, and on
/// Slack the supplied handle or a fresh `D{user}` channel.
pub struct MockDispatcher {
    provider: Provider,
    script: Mutex<VecDeque<Scripted>>,
    sent: Mutex<Vec<SentMessage>>,
    notices: Mutex<Vec<SentNotice>>,
    media: Mutex<HashMap<String, MediaContent>>,
    counter: AtomicU64,
    send_latency_ms: AtomicU64,
    notice_latency_ms: AtomicU64,
}

impl MockDispatcher {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            script: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
            media: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
            send_latency_ms: AtomicU64::new(0),
            notice_latency_ms: AtomicU64::new(0),
        }
    }

    /// Delay every `send()` by `latency` before it answers.
    pub fn set_send_latency(&self, latency: Duration) {
        self.send_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Delay every `notify()` by `latency` before it is recorded.
    pub fn set_notice_latency(&self, latency: Duration) {
        self.notice_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Make the next unscripted send return this platform message id.
    pub async fn respond_with_id(&self, id: impl Into<String>) {
        self.script.lock().await.push_back(Scripted::Id(id.into()));
    }

    /// Make the next send fail.
    pub async fn fail_next(&self, err: DispatchError) {
        self.script.lock().await.push_back(Scripted::Error(err));
    }

    /// Make the next `times` sends fail as unavailable.
    pub async fn fail_unavailable(&self, times: usize) {
        let mut script = self.script.lock().await;
        for _ in 0..times {
            script.push_back(Scripted::Error(DispatchError::Unavailable {
                provider: self.provider,
                message: "503 Service Unavailable".into(),
            }));
        }
    }

    pub async fn add_media(&self, id: impl Into<String>, content: MediaContent) {
        self.media.lock().await.insert(id.into(), content);
    }

    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn notices(&self) -> Vec<SentNotice> {
        self.notices.lock().await.clone()
    }

    fn handle_for(&self, destination: &Destination) -> String {
        match (self.provider, &destination.conversation_handle) {
            (Provider::Line, _) => destination.external_id.clone(),
            (Provider::Slack, Some(handle)) => handle.clone(),
            (Provider::Slack, None) => format!("D{}", destination.external_id),
        }
    }
}

#[async_trait]
impl PluginAdapter for MockDispatcher {
    fn name(&self) -> &str {
        "mock-dispatcher"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Dispatch
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl DispatchAdapter for MockDispatcher {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn send(
        &self,
        destination: &Destination,
        message: &OutboundMessage,
    ) -> Result<DispatchReceipt, DispatchError> {
        pause(&self.send_latency_ms).await;
        let scripted = self.script.lock().await.pop_front();
        let id = match scripted {
            Some(Scripted::Error(err)) => return Err(err),
            Some(Scripted::Id(id)) => id,
            None => {
                let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
                format!("{}-msg-{n}", self.provider)
            }
        };

        self.sent.lock().await.push(SentMessage {
            destination: destination.clone(),
            message: message.clone(),
        });
        Ok(DispatchReceipt {
            platform_message_id: id,
            conversation_handle: Some(self.handle_for(destination)),
        })
    }

    async fn notify(&self, reply: &ReplyContext, text: &str) -> Result<(), DispatchError> {
        pause(&self.notice_latency_ms).await;
        self.notices.lock().await.push(SentNotice {
            reply: reply.clone(),
            text: text.to_string(),
        });
        Ok(())
    }
}

async fn pause(latency_ms: &AtomicU64) {
    let ms = latency_ms.load(Ordering::SeqCst);
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[async_trait]
impl MediaSource for MockDispatcher {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn fetch_media(&self, media_id: &str) -> Result<MediaContent, DispatchError> {
        self.media
            .lock()
            .await
            .get(media_id)
            .cloned()
            .ok_or_else(|| DispatchError::DestinationNotFound {
                provider: self.provider,
                message: format!("no media {media_id}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutorlink_core::types::OutboundContent;

    fn text() -> OutboundMessage {
        OutboundMessage {
            content: OutboundContent::Text("hi".into()),
            sender_label: None,
        }
    }

    fn to(user: &str) -> Destination {
        Destination {
            external_id: user.into(),
            conversation_handle: None,
        }
    }

    #[tokio::test]
    async fn unscripted_sends_succeed_and_are_captured() {
        let mock = MockDispatcher::new(Provider::Slack);
        let receipt = mock.send(&to("W1"), &text()).await.unwrap();
        assert_eq!(receipt.platform_message_id, "slack-msg-1");
        assert_eq!(receipt.conversation_handle.as_deref(), Some("DW1"));
        assert_eq!(mock.sent_count().await, 1);
    }

    #[tokio::test]
    async fn script_is_consumed_in_order() {
        let mock = MockDispatcher::new(Provider::Line);
        mock.fail_unavailable(1).await;
        mock.respond_with_id("9001").await;

        assert!(mock.send(&to("U1"), &text()).await.unwrap_err().is_retryable());
        let receipt = mock.send(&to("U1"), &text()).await.unwrap();
        assert_eq!(receipt.platform_message_id, "9001");
        assert_eq!(receipt.conversation_handle.as_deref(), Some("U1"));
        assert_eq!(mock.sent_count().await, 1);
    }

    #[tokio::test]
    async fn notices_and_media() {
        let mock = MockDispatcher::new(Provider::Line);
        mock.notify(&ReplyContext::Unavailable, "hello").await.unwrap();
        assert_eq!(mock.notices().await[0].text, "hello");

        mock.add_media(
            "777",
            MediaContent {
                content_type: "image/jpeg".into(),
                bytes: vec![1, 2, 3],
            },
        )
        .await;
        assert_eq!(mock.fetch_media("777").await.unwrap().bytes, vec![1, 2, 3]);
        assert!(mock.fetch_media("778").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn notice_latency_delays_capture() {
        let mock = MockDispatcher::new(Provider::Slack);
        mock.set_notice_latency(Duration::from_secs(2));

        let started = tokio::time::Instant::now();
        mock.notify(&ReplyContext::Unavailable, "late").await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(mock.notices().await.len(), 1);
    }
}
