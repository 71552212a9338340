// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade, so nothing is recorded until a recorder is
//! installed. Recording without one is a no-op.

use metrics::{describe_counter, describe_histogram};
use tutorlink_core::types::Provider;

pub const WEBHOOK_REQUESTS: &str = "tutorlink_webhook_requests_total";
pub const RELAY_OUTCOMES: &str = "tutorlink_relay_outcomes_total";
pub const DISPATCH_ATTEMPTS: &str = "tutorlink_dispatch_attempts_total";
pub const DISPATCH_LATENCY: &str = "tutorlink_dispatch_latency_seconds";

/// Register all tutorlink metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        WEBHOOK_REQUESTS,
        "Inbound webhook requests by provider and outcome"
    );
    describe_counter!(
        RELAY_OUTCOMES,
        "Terminal outcome of each inbound event by provider"
    );
    describe_counter!(
        DISPATCH_ATTEMPTS,
        "Outbound dispatch attempts by destination provider and result"
    );
    describe_histogram!(
        DISPATCH_LATENCY,
        "Wall time of a dispatch including retries, in seconds"
    );
}

/// Record one inbound webhook request (`accepted`, `forbidden`, `malformed`, ...).
pub fn record_webhook(provider: Provider, outcome: &'static str) {
    metrics::counter!(WEBHOOK_REQUESTS, "provider" => provider.to_string(), "outcome" => outcome)
        .increment(1);
}

/// Record the terminal state an inbound event reached.
pub fn record_relay_outcome(provider: Provider, outcome: &'static str) {
    metrics::counter!(RELAY_OUTCOMES, "provider" => provider.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_dispatch_attempt(provider: Provider, result: &'static str) {
    metrics::counter!(DISPATCH_ATTEMPTS, "provider" => provider.to_string(), "result" => result)
        .increment(1);
}

pub fn record_dispatch_latency(provider: Provider, seconds: f64) {
    metrics::histogram!(DISPATCH_LATENCY, "provider" => provider.to_string()).record(seconds);
}
