// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{Router, routing::get};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tutorlink_core::types::Provider;
use tutorlink_core::{MediaSource, RelayError, RelayStore};
use tutorlink_relay::Orchestrator;
use tutorlink_security::{LineVerifier, MediaSigner, SlackVerifier};

use crate::handlers;

/// Health state for the health and metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Verification and normalization settings for the LINE webhook.
#[derive(Clone)]
pub struct LineIngress {
    pub verifier: LineVerifier,
    pub options: tutorlink_line::NormalizeOptions,
}

/// Verification and normalization settings for the Slack webhook.
#[derive(Clone)]
pub struct SlackIngress {
    pub verifier: SlackVerifier,
    pub options: tutorlink_slack::NormalizeOptions,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub orchestrator: Arc<Orchestrator>,
    /// Checked by `/health`.
    pub store: Arc<dyn RelayStore>,
    pub line: LineIngress,
    pub slack: SlackIngress,
    /// Media sources behind `/media/{provider}/{id}`.
    pub media: Arc<HashMap<Provider, Arc<dyn MediaSource>>>,
    /// Checks the `sig` every media link carries.
    pub media_signer: MediaSigner,
    pub health: HealthState,
}

/// Gateway listener address.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Build the application router.
///
/// - GET/POST /webhooks/line
/// - POST /webhooks/slack
/// - GET /media/{provider}/{id}
/// - GET /health, GET /metrics
pub fn router(state: GatewayState) -> Router {
    let webhook_routes = Router::new()
        .route(
            "/webhooks/line",
            get(handlers::get_line_liveness).post(handlers::post_line_webhook),
        )
        .route(
            "/webhooks/slack",
            axum::routing::post(handlers::post_slack_webhook),
        )
        .with_state(state.clone());

    let media_routes = Router::new()
        .route("/media/{provider}/{id}", get(handlers::get_media))
        .with_state(state.clone());

    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .route("/metrics", get(handlers::get_public_metrics))
        .with_state(state);

    Router::new()
        .merge(webhook_routes)
        .merge(media_routes)
        .merge(public_routes)
        .layer(CorsLayer::permissive())
}

/// Start the gateway HTTP server and serve until `shutdown` is cancelled.
///
/// In-flight webhook requests are allowed to finish before this returns.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), RelayError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| RelayError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("Gateway server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
    }
}
