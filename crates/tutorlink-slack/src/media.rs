// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Private file download for the media proxy.
//!
//! Looks the file up with `files.info`, then fetches its private download
//! URL with the bot token. Both legs are plain bearer-authenticated GETs
//! returning raw bytes, so they run on the shared reqwest client.

use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, warn};
use tutorlink_core::DispatchError;
use tutorlink_core::types::{MediaContent, Provider};

use crate::client::classify_slack_error;

#[derive(Debug, Deserialize)]
struct FileInfoResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    file: Option<FileInfo>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    #[serde(default)]
    mimetype: Option<String>,
    #[serde(default)]
    url_private_download: Option<String>,
    #[serde(default)]
    url_private: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileDownloader {
    http: reqwest::Client,
    bot_token: String,
    api_base_url: String,
}

impl FileDownloader {
    pub fn new(http: reqwest::Client, bot_token: String, api_base_url: &str) -> Self {
        Self {
            http,
            bot_token,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn download(&self, file_id: &str) -> Result<MediaContent, DispatchError> {
        let url = format!("{}/files.info", self.api_base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("file", file_id)])
            .bearer_auth(&self.bot_token)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        debug!(status = %status, "files.info response received");
        if !status.is_success() {
            return Err(DispatchError::from_status(
                Provider::Slack,
                status.as_u16(),
                format!("files.info returned {status}"),
            ));
        }

        let info: FileInfoResponse =
            response.json().await.map_err(|e| DispatchError::Rejected {
                provider: Provider::Slack,
                message: format!("files.info response unreadable: {e}"),
            })?;
        if !info.ok {
            let code = info.error.unwrap_or_else(|| "unknown_error".into());
            warn!(error = %code, "files.info failed");
            return Err(classify_slack_error("files.info", &code));
        }
        let Some(file) = info.file else {
            return Err(DispatchError::Rejected {
                provider: Provider::Slack,
                message: "files.info response carried no file".into(),
            });
        };
        let Some(download_url) = file.url_private_download.or(file.url_private) else {
            return Err(DispatchError::DestinationNotFound {
                provider: Provider::Slack,
                message: format!("file {file_id} has no download URL"),
            });
        };

        let response = self
            .http
            .get(&download_url)
            .bearer_auth(&self.bot_token)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::from_status(
                Provider::Slack,
                status.as_u16(),
                format!("file download returned {status}"),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or(file.mimetype)
            .unwrap_or_else(|| "application/octet-stream".into());
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(MediaContent {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

fn transport_error(e: reqwest::Error) -> DispatchError {
    DispatchError::Unavailable {
        provider: Provider::Slack,
        message: format!("HTTP request failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader(server: &MockServer) -> FileDownloader {
        FileDownloader::new(reqwest::Client::new(), "xoxb-test".into(), &server.uri())
    }

    #[tokio::test]
    async fn download_follows_private_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files.info"))
            .and(query_param("file", "F1"))
            .and(header("authorization", "Bearer xoxb-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "file": {
                    "id": "F1",
                    "mimetype": "image/png",
                    "url_private_download": format!("{}/download/F1/a.png", server.uri())
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/download/F1/a.png"))
            .and(header("authorization", "Bearer xoxb-test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0x89, 0x50, 0x4E, 0x47]),
            )
            .mount(&server)
            .await;

        let media = downloader(&server).download("F1").await.unwrap();
        assert_eq!(media.content_type, "image/png");
        assert_eq!(media.bytes, vec![0x89, 0x50, 0x4E, 0x47]);
    }

    #[tokio::test]
    async fn unknown_file_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files.info"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": false, "error": "file_not_found"})),
            )
            .mount(&server)
            .await;

        let err = downloader(&server).download("F404").await.unwrap_err();
        assert!(matches!(err, DispatchError::DestinationNotFound { .. }));
    }

    #[tokio::test]
    async fn failed_download_is_classified_by_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files.info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "file": {"id": "F2", "url_private": format!("{}/private/F2", server.uri())}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/private/F2"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = downloader(&server).download("F2").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
