// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`RelayStore`] trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use tutorlink_config::model::StorageConfig;
use tutorlink_core::types::{ExternalAccount, Message, Pairing, PartyType, Provider};
use tutorlink_core::{AdapterType, HealthStatus, PluginAdapter, RelayError, RelayStore};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed relay store.
///
/// The database is opened by [`RelayStore::initialize`]. Operations that are
/// not part of the relay contract (linking accounts, creating pairings,
/// moderation) are inherent methods used by the CLI and test fixtures.
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Open a store at `path` and initialize it in one step.
    pub async fn open(path: &str) -> Result<Self, RelayError> {
        let store = Self::new(StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        });
        store.initialize().await?;
        Ok(store)
    }

    fn db(&self) -> Result<&Database, RelayError> {
        self.db.get().ok_or_else(|| RelayError::Storage {
            source: "storage not initialized, call initialize() first".into(),
        })
    }

    // --- Account linking ---

    pub async fn link_account(
        &self,
        provider: Provider,
        external_id: &str,
        party_id: &str,
        party_type: PartyType,
    ) -> Result<ExternalAccount, RelayError> {
        queries::accounts::link_account(self.db()?, provider, external_id, party_id, party_type)
            .await
    }

    pub async fn unlink_account(
        &self,
        provider: Provider,
        party_id: &str,
        party_type: PartyType,
    ) -> Result<bool, RelayError> {
        queries::accounts::unlink_account(self.db()?, provider, party_id, party_type).await
    }

    pub async fn list_accounts_for_party(
        &self,
        party_id: &str,
        party_type: PartyType,
    ) -> Result<Vec<ExternalAccount>, RelayError> {
        queries::accounts::list_accounts_for_party(self.db()?, party_id, party_type).await
    }

    // --- Parties and pairings ---

    pub async fn upsert_student(&self, id: &str, display_name: &str) -> Result<(), RelayError> {
        queries::parties::upsert_student(self.db()?, id, display_name).await
    }

    pub async fn upsert_tutor(&self, id: &str, display_name: &str) -> Result<(), RelayError> {
        queries::parties::upsert_tutor(self.db()?, id, display_name).await
    }

    pub async fn create_pairing(&self, pairing: &Pairing) -> Result<(), RelayError> {
        queries::pairings::create_pairing(self.db()?, pairing).await
    }

    // --- Ledger moderation ---

    pub async fn messages_for_pairing(
        &self,
        pairing_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, RelayError> {
        queries::messages::messages_for_pairing(self.db()?, pairing_id, limit).await
    }

    pub async fn soft_delete_message(&self, id: &str) -> Result<bool, RelayError> {
        queries::messages::soft_delete_message(self.db()?, id).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        let Some(db) = self.db.get() else {
            return Ok(HealthStatus::Unhealthy("storage not initialized".into()));
        };
        db.connection()
            .call(|conn| -> rusqlite::Result<()> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl RelayStore for SqliteStore {
    async fn initialize(&self) -> Result<(), RelayError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| RelayError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), RelayError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    async fn find_active_account(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<ExternalAccount>, RelayError> {
        queries::accounts::find_active_account(self.db()?, provider, external_id).await
    }

    async fn find_account_for_party(
        &self,
        party_id: &str,
        party_type: PartyType,
        provider: Provider,
    ) -> Result<Option<ExternalAccount>, RelayError> {
        queries::accounts::find_account_for_party(self.db()?, party_id, party_type, provider).await
    }

    async fn set_account_conversation_handle(
        &self,
        account_id: &str,
        handle: &str,
    ) -> Result<(), RelayError> {
        queries::accounts::set_conversation_handle(self.db()?, account_id, handle).await
    }

    async fn party_display_name(
        &self,
        party_id: &str,
        party_type: PartyType,
    ) -> Result<Option<String>, RelayError> {
        queries::parties::display_name(self.db()?, party_id, party_type).await
    }

    async fn get_pairing(&self, id: &str) -> Result<Option<Pairing>, RelayError> {
        queries::pairings::get_pairing(self.db()?, id).await
    }

    async fn active_pairings_for_party(
        &self,
        party_id: &str,
        party_type: PartyType,
    ) -> Result<Vec<Pairing>, RelayError> {
        queries::pairings::active_pairings_for_party(self.db()?, party_id, party_type).await
    }

    async fn pairings_by_conversation_handle(
        &self,
        provider: Provider,
        handle: &str,
    ) -> Result<Vec<Pairing>, RelayError> {
        queries::pairings::pairings_by_conversation_handle(self.db()?, provider, handle).await
    }

    async fn set_pairing_conversation_handle(
        &self,
        pairing_id: &str,
        provider: Provider,
        handle: &str,
    ) -> Result<(), RelayError> {
        queries::pairings::set_conversation_handle(self.db()?, pairing_id, provider, handle).await
    }

    async fn insert_message(&self, message: &Message) -> Result<(), RelayError> {
        queries::messages::insert_message(self.db()?, message).await
    }

    async fn find_message_by_thread_id(
        &self,
        thread_id: &str,
    ) -> Result<Option<Message>, RelayError> {
        queries::messages::find_by_thread_id(self.db()?, thread_id).await
    }
}
