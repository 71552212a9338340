// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway.
//!
//! Webhook handlers verify the raw body before parsing it. Once a request is
//! authenticated and well formed it is acknowledged with 200 whatever the
//! relay outcome, so platforms never redeliver an already attempted event.

use std::str::FromStr;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tutorlink_core::types::{HealthStatus, Provider, is_valid_media_id};
use tutorlink_core::DispatchError;
use tutorlink_relay::Deadline;

use crate::server::GatewayState;

const LINE_SIGNATURE: &str = "x-line-signature";
const SLACK_SIGNATURE: &str = "x-slack-signature";
const SLACK_TIMESTAMP: &str = "x-slack-request-timestamp";

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status string.
    pub status: String,
    /// Binary version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_secs: u64,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn ack() -> Response {
    (StatusCode::OK, Json(serde_json::json!({}))).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// GET /webhooks/line
///
/// Static liveness answer used by the LINE console's "Verify" button.
pub async fn get_line_liveness() -> &'static str {
    "OK"
}

/// POST /webhooks/line
pub async fn post_line_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // One budget for the whole body, however many events it carries.
    let deadline = Deadline::after(state.orchestrator.processing_budget());

    if let Err(e) = state
        .line
        .verifier
        .verify(&body, header_str(&headers, LINE_SIGNATURE))
    {
        warn!(error = %e, "rejecting LINE webhook");
        tutorlink_prometheus::record_webhook(Provider::Line, "unauthorized");
        return error_response(StatusCode::UNAUTHORIZED, "invalid signature");
    }

    let parsed = match tutorlink_line::parse_webhook(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "malformed LINE webhook");
            tutorlink_prometheus::record_webhook(Provider::Line, "malformed");
            return error_response(StatusCode::BAD_REQUEST, "malformed payload");
        }
    };

    let events = tutorlink_line::normalize_body(&parsed, &state.line.options);
    debug!(count = events.len(), "processing LINE events");
    for event in events {
        state.orchestrator.handle_within(event, &deadline).await;
    }

    tutorlink_prometheus::record_webhook(Provider::Line, "accepted");
    ack()
}

/// POST /webhooks/slack
///
/// `url_verification` is answered before any signature check.
pub async fn post_slack_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let deadline = Deadline::after(state.orchestrator.processing_budget());

    if let Some(challenge) = tutorlink_slack::url_verification_challenge(&body) {
        tutorlink_prometheus::record_webhook(Provider::Slack, "challenge");
        return (
            StatusCode::OK,
            Json(serde_json::json!({ "challenge": challenge })),
        )
            .into_response();
    }

    if let Err(e) = state.slack.verifier.verify(
        &body,
        header_str(&headers, SLACK_SIGNATURE),
        header_str(&headers, SLACK_TIMESTAMP),
    ) {
        warn!(error = %e, "rejecting Slack webhook");
        tutorlink_prometheus::record_webhook(Provider::Slack, "unauthorized");
        return error_response(StatusCode::UNAUTHORIZED, "invalid signature");
    }

    let envelope = match tutorlink_slack::parse_envelope(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "malformed Slack webhook");
            tutorlink_prometheus::record_webhook(Provider::Slack, "malformed");
            return error_response(StatusCode::BAD_REQUEST, "malformed payload");
        }
    };

    let event = tutorlink_slack::normalize_envelope(&envelope, &state.slack.options);
    state.orchestrator.handle_within(event, &deadline).await;

    tutorlink_prometheus::record_webhook(Provider::Slack, "accepted");
    ack()
}

/// Status returned to the media proxy's caller for an upstream failure.
pub fn media_error_status(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::DestinationNotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Query string of a media link.
#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub sig: Option<String>,
}

/// GET /media/{provider}/{id}?sig=...
///
/// Streams inbound media from the platform using the bot credential. Links
/// without a valid signature get the same 404 as unknown media.
pub async fn get_media(
    State(state): State<GatewayState>,
    Path((provider, id)): Path<(String, String)>,
    Query(query): Query<MediaQuery>,
) -> Response {
    let Ok(provider) = Provider::from_str(&provider) else {
        return error_response(StatusCode::NOT_FOUND, "unknown provider");
    };
    if !is_valid_media_id(&id) {
        return error_response(StatusCode::BAD_REQUEST, "invalid media id");
    }
    if !state
        .media_signer
        .verify(provider, &id, query.sig.as_deref())
    {
        debug!(provider = %provider, media_id = %id, "media link signature rejected");
        return error_response(StatusCode::NOT_FOUND, "media not available");
    }
    let Some(source) = state.media.get(&provider) else {
        return error_response(StatusCode::NOT_FOUND, "media not available");
    };

    match source.fetch_media(&id).await {
        Ok(media) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, media.content_type)],
            media.bytes,
        )
            .into_response(),
        Err(e) => {
            warn!(provider = %provider, media_id = %id, error = %e, "media fetch failed");
            let status = media_error_status(&e);
            error_response(status, status.canonical_reason().unwrap_or("error"))
        }
    }
}

/// GET /health
///
/// Reports healthy only when the store answers.
pub async fn get_public_health(State(state): State<GatewayState>) -> Response {
    let (code, status) = match state.store.health_check().await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "ok".to_string()),
        Ok(HealthStatus::Degraded(reason)) => (StatusCode::OK, format!("degraded: {reason}")),
        Ok(HealthStatus::Unhealthy(reason)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("unhealthy: {reason}"),
        ),
        Err(e) => {
            warn!(error = %e, "store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy".to_string())
        }
    };

    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    };
    (code, Json(body)).into_response()
}

/// GET /metrics
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "metrics disabled"),
    }
}
