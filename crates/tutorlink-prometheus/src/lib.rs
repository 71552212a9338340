// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for the tutorlink relay.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. Metrics are
//! rendered as Prometheus text through the gateway's `/metrics` endpoint.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use tutorlink_core::types::{AdapterType, HealthStatus};
use tutorlink_core::{PluginAdapter, RelayError};

pub use recording::{
    record_dispatch_attempt, record_dispatch_latency, record_relay_outcome, record_webhook,
    register_metrics,
};

/// Prometheus metrics adapter.
///
/// Holds the handle of the installed recorder for rendering.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Install the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn new() -> Result<Self, RelayError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            RelayError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutorlink_core::types::Provider;

    #[test]
    fn helpers_record_into_local_recorder() {
        // A local recorder keeps the global slot free for other tests.
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            register_metrics();
            record_webhook(Provider::Line, "accepted");
            record_webhook(Provider::Line, "accepted");
            record_relay_outcome(Provider::Slack, "relayed");
            record_dispatch_attempt(Provider::Slack, "unavailable");
            record_dispatch_latency(Provider::Slack, 0.25);
        });

        let text = handle.render();
        let webhook_line = text
            .lines()
            .find(|l| l.starts_with("tutorlink_webhook_requests_total{"))
            .unwrap();
        assert!(webhook_line.contains(r#"provider="line""#));
        assert!(webhook_line.ends_with(" 2"));
        assert!(text.contains(r#"outcome="relayed""#));
        assert!(text.contains("tutorlink_dispatch_attempts_total"));
        assert!(text.contains("tutorlink_dispatch_latency_seconds"));
    }
}
