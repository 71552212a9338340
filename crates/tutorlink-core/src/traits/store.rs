// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store contract the relay reads pairing/account records from and writes
//! the message ledger to.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ExternalAccount, Message, Pairing, PartyType, Provider};

/// Persistence backend for the relay.
///
/// Account and pairing records are owned by the rest of the platform; the
/// relay only reads them, caches conversation handles on them, and appends
/// to the message ledger.
#[async_trait]
pub trait RelayStore: PluginAdapter {
    /// Initializes the backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), RelayError>;

    /// Flushes pending writes and releases the connection.
    async fn close(&self) -> Result<(), RelayError>;

    // --- External accounts ---

    /// Active account for a platform identity.
    async fn find_active_account(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<ExternalAccount>, RelayError>;

    /// Active account a party holds on a platform.
    async fn find_account_for_party(
        &self,
        party_id: &str,
        party_type: PartyType,
        provider: Provider,
    ) -> Result<Option<ExternalAccount>, RelayError>;

    async fn set_account_conversation_handle(
        &self,
        account_id: &str,
        handle: &str,
    ) -> Result<(), RelayError>;

    /// Display name of a student or tutor.
    async fn party_display_name(
        &self,
        party_id: &str,
        party_type: PartyType,
    ) -> Result<Option<String>, RelayError>;

    // --- Pairings ---

    async fn get_pairing(&self, id: &str) -> Result<Option<Pairing>, RelayError>;

    /// Active pairings involving a party, most recently started first.
    async fn active_pairings_for_party(
        &self,
        party_id: &str,
        party_type: PartyType,
    ) -> Result<Vec<Pairing>, RelayError>;

    async fn pairings_by_conversation_handle(
        &self,
        provider: Provider,
        handle: &str,
    ) -> Result<Vec<Pairing>, RelayError>;

    async fn set_pairing_conversation_handle(
        &self,
        pairing_id: &str,
        provider: Provider,
        handle: &str,
    ) -> Result<(), RelayError>;

    // --- Message ledger ---

    /// Appends a ledger row. Rows are never updated afterwards.
    async fn insert_message(&self, message: &Message) -> Result<(), RelayError>;

    /// Non-deleted ledger row carrying the given correlation id.
    async fn find_message_by_thread_id(
        &self,
        thread_id: &str,
    ) -> Result<Option<Message>, RelayError>;
}
