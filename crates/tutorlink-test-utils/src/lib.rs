// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for tutorlink integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic tests without the real platforms.
//!
//! # Components
//!
//! - [`MockDispatcher`] - Mock outbound adapter with scripted results
//! - [`RelayHarness`] - Temp SQLite store plus an orchestrator over mocks

pub mod harness;
pub mod mock_dispatcher;

pub use harness::{RelayHarness, RelayHarnessBuilder, line_text, slack_text};
pub use mock_dispatcher::{MockDispatcher, SentMessage, SentNotice};
