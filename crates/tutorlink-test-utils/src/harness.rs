// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end relay testing.
//!
//! `RelayHarness` assembles a temp SQLite store, one [`MockDispatcher`] per
//! platform, and an [`Orchestrator`] wired to them. Seeding helpers create
//! parties, linked accounts and pairings; event helpers build normalized
//! inbound messages the way the webhook layer would.

use std::sync::Arc;
use std::time::Duration;

use tutorlink_config::PairingFallbackMode;
use tutorlink_config::model::StorageConfig;
use tutorlink_core::types::{
    ExternalAccount, InboundEvent, InboundMessage, Message, MessageContent, Pairing,
    PairingStatus, PartyType, Provider, ReplyContext,
};
use tutorlink_core::{RelayError, RelayStore};
use tutorlink_relay::{Orchestrator, RelayOutcome, RetryPolicy, fallback_for};
use tutorlink_storage::SqliteStore;

use crate::mock_dispatcher::MockDispatcher;

/// Builder for creating test environments with configurable options.
pub struct RelayHarnessBuilder {
    retry: RetryPolicy,
    budget: Duration,
    fallback: PairingFallbackMode,
}

impl RelayHarnessBuilder {
    fn new() -> Self {
        Self {
            // Same attempt count as production, with millisecond backoffs.
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                multiplier: 3,
                max_backoff: Duration::from_millis(9),
            },
            budget: Duration::from_millis(2500),
            fallback: PairingFallbackMode::MostRecentActive,
        }
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn processing_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn pairing_fallback(mut self, mode: PairingFallbackMode) -> Self {
        self.fallback = mode;
        self
    }

    /// Build the harness, creating the store and wiring the orchestrator.
    pub async fn build(self) -> Result<RelayHarness, RelayError> {
        let temp_dir = tempfile::TempDir::new().map_err(RelayError::storage)?;
        let db_path = temp_dir.path().join("relay.db");

        let store = SqliteStore::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        });
        store.initialize().await?;
        let store = Arc::new(store);

        let line = Arc::new(MockDispatcher::new(Provider::Line));
        let slack = Arc::new(MockDispatcher::new(Provider::Slack));

        let orchestrator = Orchestrator::builder(store.clone())
            .dispatcher(line.clone())
            .dispatcher(slack.clone())
            .retry_policy(self.retry)
            .processing_budget(self.budget)
            .fallback(fallback_for(self.fallback))
            .build();

        Ok(RelayHarness {
            store,
            line,
            slack,
            orchestrator: Arc::new(orchestrator),
            _temp_dir: temp_dir,
        })
    }
}

/// A complete relay over a throwaway database.
pub struct RelayHarness {
    pub store: Arc<SqliteStore>,
    pub line: Arc<MockDispatcher>,
    pub slack: Arc<MockDispatcher>,
    pub orchestrator: Arc<Orchestrator>,
    _temp_dir: tempfile::TempDir,
}

impl RelayHarness {
    pub fn builder() -> RelayHarnessBuilder {
        RelayHarnessBuilder::new()
    }

    /// Harness with default settings.
    pub async fn new() -> Result<Self, RelayError> {
        Self::builder().build().await
    }

    /// Seed the canonical fixture: student `s1` "Sora" on LINE as `U1`,
    /// tutor `t1` "Taro" on Slack as `W1`, active pairing `p1`.
    pub async fn seed_standard(&self) -> Result<Pairing, RelayError> {
        self.store.upsert_student("s1", "Sora").await?;
        self.store.upsert_tutor("t1", "Taro").await?;
        self.link(Provider::Line, "U1", "s1", PartyType::Student)
            .await?;
        self.link(Provider::Slack, "W1", "t1", PartyType::Tutor)
            .await?;
        self.pair("p1", "s1", "t1", PairingStatus::Active, "2026-01-10T09:00:00.000Z")
            .await
    }

    pub async fn link(
        &self,
        provider: Provider,
        external_id: &str,
        party_id: &str,
        party_type: PartyType,
    ) -> Result<ExternalAccount, RelayError> {
        self.store
            .link_account(provider, external_id, party_id, party_type)
            .await
    }

    pub async fn pair(
        &self,
        id: &str,
        student_id: &str,
        tutor_id: &str,
        status: PairingStatus,
        started_at: &str,
    ) -> Result<Pairing, RelayError> {
        let pairing = Pairing {
            id: id.to_string(),
            student_id: student_id.to_string(),
            tutor_id: tutor_id.to_string(),
            status,
            line_chat_id: None,
            slack_channel_id: None,
            started_at: Some(started_at.to_string()),
            created_at: started_at.to_string(),
            updated_at: started_at.to_string(),
        };
        self.store.create_pairing(&pairing).await?;
        Ok(pairing)
    }

    /// Drive one event through the orchestrator.
    pub async fn relay(&self, event: InboundEvent) -> RelayOutcome {
        self.orchestrator.handle(event).await
    }

    /// Ledger rows of a pairing, oldest first.
    pub async fn ledger(&self, pairing_id: &str) -> Result<Vec<Message>, RelayError> {
        self.store.messages_for_pairing(pairing_id, None).await
    }

    pub async fn pairing(&self, id: &str) -> Result<Option<Pairing>, RelayError> {
        self.store.get_pairing(id).await
    }
}

/// A LINE text message from `user_id`, optionally quoting `quoted`.
pub fn line_text(user_id: &str, message_id: &str, text: &str, quoted: Option<&str>) -> InboundEvent {
    InboundEvent::Message(InboundMessage {
        provider: Provider::Line,
        sender_external_id: user_id.to_string(),
        content: MessageContent::Text(text.to_string()),
        source_message_id: Some(message_id.to_string()),
        thread_hint: quoted.map(str::to_string),
        reply: ReplyContext::Line {
            reply_token: format!("rt-{message_id}"),
        },
    })
}

/// A Slack DM from `user_id` in `channel`, optionally inside the thread `thread_ts`.
pub fn slack_text(
    user_id: &str,
    channel: &str,
    ts: &str,
    text: &str,
    thread_ts: Option<&str>,
) -> InboundEvent {
    InboundEvent::Message(InboundMessage {
        provider: Provider::Slack,
        sender_external_id: user_id.to_string(),
        content: MessageContent::Text(text.to_string()),
        source_message_id: Some(ts.to_string()),
        thread_hint: thread_ts.map(str::to_string),
        reply: ReplyContext::Slack {
            channel: channel.to_string(),
            ts: thread_ts.unwrap_or(ts).to_string(),
        },
    })
}
