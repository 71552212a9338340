// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the LINE Messaging API.
//!
//! Each call is a single attempt. Retry policy lives in the relay, which
//! decides from the [`DispatchError`] class whether another attempt is worth it.

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};
use tutorlink_core::DispatchError;
use tutorlink_core::types::{MediaContent, Provider};

use crate::types::{ApiErrorResponse, OutMessage, PushRequest, PushResponse, ReplyRequest};

/// Response header LINE attaches to every API response.
const REQUEST_ID_HEADER: &str = "x-line-request-id";

#[derive(Debug, Clone)]
pub struct LineClient {
    http: reqwest::Client,
    access_token: String,
    api_base_url: String,
    data_api_base_url: String,
}

impl LineClient {
    pub fn new(
        http: reqwest::Client,
        access_token: String,
        api_base_url: String,
        data_api_base_url: String,
    ) -> Self {
        Self {
            http,
            access_token,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            data_api_base_url: data_api_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Push messages to a user. Returns the id of the first sent message.
    ///
    /// That id is what a later `quotedMessageId` refers to, so a response
    /// without one is rejected rather than recorded under another id.
    pub async fn push(&self, to: &str, messages: &[OutMessage]) -> Result<String, DispatchError> {
        let url = format!("{}/v2/bot/message/push", self.api_base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&PushRequest { to, messages })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        debug!(status = %status, "LINE push response received");
        if !status.is_success() {
            return Err(api_error(response).await);
        }

        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();
        let body: PushResponse = response.json().await.unwrap_or_default();

        match body.sent_messages.into_iter().next() {
            Some(sent) => Ok(sent.id),
            None => {
                warn!(request_id = %request_id, "LINE push response carried no message id");
                Err(DispatchError::Rejected {
                    provider: Provider::Line,
                    message: format!("push response carried no message id (request {request_id})"),
                })
            }
        }
    }

    /// Reply into the session that produced `reply_token`. Tokens are single use.
    pub async fn reply(
        &self,
        reply_token: &str,
        messages: &[OutMessage],
    ) -> Result<(), DispatchError> {
        let url = format!("{}/v2/bot/message/reply", self.api_base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&ReplyRequest {
                reply_token,
                messages,
            })
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(api_error(response).await)
        }
    }

    /// Download the bytes of an inbound image, video or file message.
    pub async fn get_content(&self, message_id: &str) -> Result<MediaContent, DispatchError> {
        let url = format!(
            "{}/v2/bot/message/{message_id}/content",
            self.data_api_base_url
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(MediaContent {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

fn transport_error(e: reqwest::Error) -> DispatchError {
    DispatchError::Unavailable {
        provider: Provider::Line,
        message: format!("HTTP request failed: {e}"),
    }
}

async fn api_error(response: reqwest::Response) -> DispatchError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorResponse>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    warn!(status = %status, message = %message, "LINE API error");
    DispatchError::from_status(Provider::Line, status.as_u16(), format!("{status}: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> LineClient {
        LineClient::new(
            reqwest::Client::new(),
            "line-token".into(),
            server.uri(),
            server.uri(),
        )
    }

    #[tokio::test]
    async fn push_returns_sent_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/push"))
            .and(header("authorization", "Bearer line-token"))
            .and(body_json(serde_json::json!({
                "to": "U1",
                "messages": [{"type": "text", "text": "Taro: hi"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sentMessages": [{"id": "461230966842064897", "quoteToken": "q"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server)
            .push("U1", &[OutMessage::Text { text: "Taro: hi".into() }])
            .await
            .unwrap();
        assert_eq!(id, "461230966842064897");
    }

    #[tokio::test]
    async fn push_without_message_id_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/push"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-line-request-id", "req-42")
                    .set_body_json(serde_json::json!({})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .push("U1", &[OutMessage::Text { text: "x".into() }])
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Rejected { .. }));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("req-42"));
    }

    #[tokio::test]
    async fn status_codes_are_classified() {
        for (status, retryable) in [(500, true), (429, true), (401, false), (400, false)] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v2/bot/message/push"))
                .respond_with(
                    ResponseTemplate::new(status)
                        .set_body_json(serde_json::json!({"message": "nope"})),
                )
                .mount(&server)
                .await;

            let err = client(&server)
                .push("U1", &[OutMessage::Text { text: "x".into() }])
                .await
                .unwrap_err();
            assert_eq!(err.is_retryable(), retryable, "status {status}");
            assert!(err.to_string().contains("nope"));
        }
    }

    #[tokio::test]
    async fn reply_posts_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/reply"))
            .and(body_json(serde_json::json!({
                "replyToken": "rt-1",
                "messages": [{"type": "text", "text": "notice"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .reply("rt-1", &[OutMessage::Text { text: "notice".into() }])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn content_download_keeps_mime_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/bot/message/777/content"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(vec![0xFF, 0xD8, 0xFF]),
            )
            .mount(&server)
            .await;

        let media = client(&server).get_content("777").await.unwrap();
        assert_eq!(media.content_type, "image/jpeg");
        assert_eq!(media.bytes, vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn missing_content_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/bot/message/404/content"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server).get_content("404").await.unwrap_err();
        assert!(matches!(err, DispatchError::DestinationNotFound { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_retryable() {
        let client = LineClient::new(
            reqwest::Client::new(),
            "t".into(),
            "http://127.0.0.1:9".into(),
            "http://127.0.0.1:9".into(),
        );
        let err = client
            .push("U1", &[OutMessage::Text { text: "x".into() }])
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
