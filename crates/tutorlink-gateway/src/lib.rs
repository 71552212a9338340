// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the tutorlink relay.
//!
//! Receives LINE and Slack webhooks, verifies them over the raw body, and
//! hands normalized events to the relay orchestrator one at a time. Also
//! serves the public media proxy, `/health` and `/metrics`.

pub mod handlers;
pub mod server;

pub use server::{
    GatewayState, HealthState, LineIngress, ServerConfig, SlackIngress, router, start_server,
};
