// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tutorlink serve` command implementation.
//!
//! Builds the store, both platform adapters and the orchestrator from
//! configuration, then serves the webhook gateway until SIGINT or SIGTERM.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tutorlink_config::TutorlinkConfig;
use tutorlink_core::types::{HealthStatus, Provider};
use tutorlink_core::{DispatchAdapter, MediaSource, PluginAdapter, RelayError, RelayStore};
use tutorlink_gateway::{GatewayState, HealthState, LineIngress, ServerConfig, SlackIngress};
use tutorlink_line::LineDispatcher;
use tutorlink_prometheus::PrometheusAdapter;
use tutorlink_relay::Orchestrator;
use tutorlink_security::{
    LineVerifier, MediaLinks, MediaSigner, RedactingWriter, SecretList, SlackVerifier,
};
use tutorlink_slack::SlackDispatcher;
use tutorlink_storage::SqliteStore;

/// Runs the `tutorlink serve` command.
pub async fn run_serve(config: TutorlinkConfig) -> Result<(), RelayError> {
    init_tracing(&config.server.log_level, collect_secrets(&config));

    info!(environment = %config.server.environment, "starting tutorlink serve");

    let prometheus = PrometheusAdapter::new()?;
    let metrics_handle = prometheus.handle().clone();

    let store = Arc::new(SqliteStore::new(config.storage.clone()));
    store.initialize().await?;

    let request_timeout = Duration::from_millis(config.relay.request_timeout_ms);
    let line = Arc::new(LineDispatcher::new(&config.line, request_timeout)?);
    let slack = Arc::new(SlackDispatcher::new(&config.slack, request_timeout)?);
    report_health(line.as_ref()).await;
    report_health(slack.as_ref()).await;

    let orchestrator = Orchestrator::builder(store.clone())
        .dispatcher(line.clone() as Arc<dyn DispatchAdapter>)
        .dispatcher(slack.clone() as Arc<dyn DispatchAdapter>)
        .config(&config.relay)
        .build();

    let mut media: HashMap<Provider, Arc<dyn MediaSource>> = HashMap::new();
    media.insert(Provider::Line, line);
    media.insert(Provider::Slack, slack);

    let production = config.server.environment.is_production();
    let media_signer = media_signer(&config);
    let media_links = config
        .server
        .public_base_url
        .clone()
        .map(|base| MediaLinks::new(base, media_signer.clone()));
    let state = GatewayState {
        orchestrator: Arc::new(orchestrator),
        store: store.clone(),
        line: LineIngress {
            verifier: LineVerifier::new(config.line.channel_secret.clone(), production),
            options: tutorlink_line::NormalizeOptions {
                bot_user_id: config.line.bot_user_id.clone(),
                media_links: media_links.clone(),
            },
        },
        slack: SlackIngress {
            verifier: SlackVerifier::new(
                config.slack.signing_secret.clone(),
                production,
                config.slack.max_timestamp_skew_secs,
            ),
            options: tutorlink_slack::NormalizeOptions {
                bot_user_id: config.slack.bot_user_id.clone(),
                media_links,
            },
        },
        media: Arc::new(media),
        media_signer,
        health: HealthState {
            start_time: Instant::now(),
            prometheus_render: Some(Arc::new(move || metrics_handle.render())),
        },
    };

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let cancel = install_signal_handler();
    let served = tutorlink_gateway::start_server(&server_config, state, cancel).await;
    if let Err(e) = &served {
        error!(error = %e, "gateway stopped with an error");
    }

    if let Err(e) = store.close().await {
        warn!(error = %e, "failed to close storage cleanly");
    }
    info!("tutorlink stopped");
    served
}

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), initiating shutdown");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, initiating shutdown");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler, listening for Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// The configured media signing key, or a per-process one in development.
/// Links signed with a per-process key stop working after a restart.
fn media_signer(config: &TutorlinkConfig) -> MediaSigner {
    match config
        .server
        .media_signing_key
        .as_deref()
        .filter(|k| !k.is_empty())
    {
        Some(key) => MediaSigner::new(key),
        None => {
            warn!("server.media_signing_key not set, signing media links with a temporary key");
            MediaSigner::new(uuid::Uuid::new_v4().to_string())
        }
    }
}

async fn report_health(adapter: &dyn PluginAdapter) {
    match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => debug!(adapter = adapter.name(), "adapter ready"),
        Ok(HealthStatus::Degraded(reason)) | Ok(HealthStatus::Unhealthy(reason)) => {
            warn!(adapter = adapter.name(), reason = %reason, "adapter not fully configured");
        }
        Err(e) => warn!(adapter = adapter.name(), error = %e, "adapter health check failed"),
    }
}

/// Every configured credential, for exact-match log redaction.
pub fn collect_secrets(config: &TutorlinkConfig) -> SecretList {
    let secrets: SecretList = Arc::new(RwLock::new(Vec::new()));
    let values = [
        &config.line.channel_access_token,
        &config.line.channel_secret,
        &config.slack.bot_token,
        &config.slack.signing_secret,
        &config.server.media_signing_key,
    ];
    for value in values.into_iter().flatten() {
        RedactingWriter::<std::io::Stderr>::add_secret(&secrets, value.clone());
    }
    secrets
}

/// Initializes the tracing subscriber with the given log level.
///
/// Output goes to stderr through the redacting writer.
fn init_tracing(log_level: &str, secrets: SecretList) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tutorlink={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(move || RedactingWriter::new(std::io::stderr(), secrets.clone()))
        .init();
}
