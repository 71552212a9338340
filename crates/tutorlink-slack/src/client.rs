// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack Web API calls used for delivery.
//!
//! Calls go through a `slack-morphism` session. Slack answers most failures
//! with HTTP 200 and `{"ok": false, "error": code}`, so classification looks
//! at the error code first and the status second.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use slack_morphism::errors::SlackClientError;
use slack_morphism::prelude::{
    SlackApiChatPostMessageRequest, SlackApiConversationsOpenRequest, SlackApiToken,
    SlackApiTokenValue, SlackChannelId, SlackClient, SlackClientHyperConnector,
    SlackClientHyperHttpsConnector, SlackMessageContent, SlackTs, SlackUserId,
};
use tracing::{debug, warn};
use tutorlink_core::types::Provider;
use tutorlink_core::{DispatchError, RelayError};

/// A posted message as Slack recorded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

/// The Web API methods delivery needs.
#[async_trait]
pub trait SlackWebApi: Send + Sync {
    /// Open (or fetch) the DM channel with a user.
    async fn open_conversation(&self, user_id: &str) -> Result<String, DispatchError>;

    async fn post_message(
        &self,
        channel: &str,
        content: SlackMessageContent,
        thread_ts: Option<&str>,
    ) -> Result<PostedMessage, DispatchError>;
}

pub type SlackHyperClient = SlackClient<SlackClientHyperHttpsConnector>;

/// [`SlackWebApi`] over a `slack-morphism` hyper client.
pub struct SessionApi {
    client: SlackHyperClient,
    token: SlackApiToken,
    timeout: Duration,
}

impl SessionApi {
    pub fn new(api_base_url: &str, bot_token: String, timeout: Duration) -> Result<Self, RelayError> {
        let connector = SlackClientHyperConnector::new()
            .map_err(|e| RelayError::Config(format!("Slack HTTP connector: {e}")))?
            .with_slack_api_url(&format!("{}/", api_base_url.trim_end_matches('/')));
        Ok(Self {
            client: SlackClient::new(connector),
            token: SlackApiToken::new(SlackApiTokenValue(bot_token)),
            timeout,
        })
    }

    /// Run one call, cut off at the request timeout.
    async fn bounded<T, F>(&self, method: &str, call: F) -> Result<T, DispatchError>
    where
        F: Future<Output = Result<T, SlackClientError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => {
                debug!(method, "Slack API call succeeded");
                Ok(value)
            }
            Ok(Err(e)) => {
                warn!(method, error = %e, "Slack API error");
                Err(classify_client_error(method, &e))
            }
            Err(_) => Err(DispatchError::Unavailable {
                provider: Provider::Slack,
                message: format!("{method} timed out after {}ms", self.timeout.as_millis()),
            }),
        }
    }
}

#[async_trait]
impl SlackWebApi for SessionApi {
    async fn open_conversation(&self, user_id: &str) -> Result<String, DispatchError> {
        let session = self.client.open_session(&self.token);
        let request =
            SlackApiConversationsOpenRequest::new().with_users(vec![SlackUserId(user_id.to_string())]);
        let response = self
            .bounded("conversations.open", session.conversations_open(&request))
            .await?;
        Ok(response.channel.id.0)
    }

    async fn post_message(
        &self,
        channel: &str,
        content: SlackMessageContent,
        thread_ts: Option<&str>,
    ) -> Result<PostedMessage, DispatchError> {
        let session = self.client.open_session(&self.token);
        let mut request = SlackApiChatPostMessageRequest::new(SlackChannelId(channel.to_string()), content);
        if let Some(ts) = thread_ts {
            request = request.with_thread_ts(SlackTs(ts.to_string()));
        }
        let response = self
            .bounded("chat.postMessage", session.chat_post_message(&request))
            .await?;
        Ok(PostedMessage {
            channel: response.channel.0,
            ts: response.ts.0,
        })
    }
}

/// Map a `slack-morphism` client error onto the dispatch error classes.
pub fn classify_client_error(method: &str, err: &SlackClientError) -> DispatchError {
    let provider = Provider::Slack;
    match err {
        SlackClientError::ApiError(api) => classify_slack_error(method, &api.code),
        SlackClientError::HttpError(http) => DispatchError::from_status(
            provider,
            http.status_code.as_u16(),
            format!("{method} returned {}", http.status_code),
        ),
        SlackClientError::RateLimitError(_) => DispatchError::Unavailable {
            provider,
            message: format!("{method}: rate limited"),
        },
        SlackClientError::ProtocolError(_) => {
            DispatchError::Rejected {
                provider,
                message: format!("{method}: {err}"),
            }
        }
        _ => DispatchError::Unavailable {
            provider,
            message: format!("{method}: {err}"),
        },
    }
}

/// Map a Slack `error` code onto the dispatch error classes.
pub fn classify_slack_error(method: &str, code: &str) -> DispatchError {
    let provider = Provider::Slack;
    let message = format!("{method}: {code}");
    match code {
        "invalid_auth" | "not_authed" | "token_revoked" | "token_expired" | "account_inactive"
        | "missing_scope" => DispatchError::InvalidCredentials { provider, message },
        "channel_not_found" | "user_not_found" | "users_not_found" | "file_not_found"
        | "is_archived" | "cannot_dm_bot" | "user_disabled" => {
            DispatchError::DestinationNotFound { provider, message }
        }
        "ratelimited" | "internal_error" | "fatal_error" | "service_unavailable"
        | "request_timeout" => DispatchError::Unavailable { provider, message },
        _ => DispatchError::Rejected { provider, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_classified() {
        assert!(matches!(
            classify_slack_error("chat.postMessage", "token_revoked"),
            DispatchError::InvalidCredentials { .. }
        ));
        assert!(matches!(
            classify_slack_error("chat.postMessage", "channel_not_found"),
            DispatchError::DestinationNotFound { .. }
        ));
        assert!(classify_slack_error("chat.postMessage", "ratelimited").is_retryable());
        assert!(classify_slack_error("conversations.open", "internal_error").is_retryable());
        assert!(matches!(
            classify_slack_error("chat.postMessage", "msg_too_long"),
            DispatchError::Rejected { .. }
        ));
    }

    #[test]
    fn messages_name_the_method() {
        let err = classify_slack_error("conversations.open", "user_not_found");
        assert!(err.to_string().contains("conversations.open: user_not_found"));
        assert_eq!(err.provider(), Provider::Slack);
    }
}
