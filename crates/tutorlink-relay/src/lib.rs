// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay orchestration for tutorlink.
//!
//! The [`Orchestrator`] takes normalized inbound events from either platform
//! and carries each one through account resolution, pairing resolution,
//! dispatch with bounded retry, and the message ledger.

pub mod notice;
pub mod orchestrator;
pub mod resolver;
pub mod retry;

pub use notice::Notice;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, RelayOutcome};
pub use resolver::{
    AccountResolver, MostRecentActive, PairingFallback, PairingResolver, RejectAmbiguous,
    fallback_for,
};
pub use retry::{Deadline, RetryPolicy};
