// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tutorlink accounts` and `tutorlink ledger` command implementations.
//!
//! Each command returns the lines to print so the output can be asserted on.

use clap::Subcommand;
use tutorlink_core::RelayError;
use tutorlink_core::types::{ExternalAccount, Message, PartyType, Provider};
use tutorlink_storage::SqliteStore;

/// Account linking subcommands.
#[derive(Subcommand, Debug)]
pub enum AccountsCommand {
    /// Link a platform identity to a student or tutor, replacing any
    /// previous link on that platform.
    Link {
        /// `line` or `slack`.
        provider: Provider,
        /// The platform's user id (LINE `U...`, Slack `U...`/`W...`).
        external_id: String,
        party_id: String,
        /// `student` or `tutor`.
        party_type: PartyType,
    },
    /// Deactivate a party's link on one platform.
    Unlink {
        provider: Provider,
        party_id: String,
        party_type: PartyType,
    },
    /// Show every link of a party, active or not.
    List {
        party_id: String,
        party_type: PartyType,
    },
}

/// Ledger moderation subcommands.
#[derive(Subcommand, Debug)]
pub enum LedgerCommand {
    /// Soft-delete a message. It stays in the database but is hidden from
    /// history and thread correlation.
    Delete { message_id: String },
    /// Print a pairing's message history, oldest first.
    List {
        pairing_id: String,
        /// Show at most this many messages.
        #[arg(long)]
        limit: Option<i64>,
    },
}

pub async fn run_accounts(
    store: &SqliteStore,
    command: AccountsCommand,
) -> Result<Vec<String>, RelayError> {
    match command {
        AccountsCommand::Link {
            provider,
            external_id,
            party_id,
            party_type,
        } => {
            let account = store
                .link_account(provider, &external_id, &party_id, party_type)
                .await?;
            tracing::info!(provider = %provider, external_id = %external_id, "account linked");
            Ok(vec![format!(
                "linked {party_type} {party_id} to {provider} {external_id} ({})",
                account.id
            )])
        }
        AccountsCommand::Unlink {
            provider,
            party_id,
            party_type,
        } => {
            let line = if store
                .unlink_account(provider, &party_id, party_type)
                .await?
            {
                format!("unlinked {party_type} {party_id} from {provider}")
            } else {
                format!("{party_type} {party_id} has no active {provider} account")
            };
            Ok(vec![line])
        }
        AccountsCommand::List {
            party_id,
            party_type,
        } => {
            let accounts = store.list_accounts_for_party(&party_id, party_type).await?;
            if accounts.is_empty() {
                return Ok(vec![format!("no accounts for {party_type} {party_id}")]);
            }
            Ok(accounts.iter().map(format_account).collect())
        }
    }
}

pub async fn run_ledger(
    store: &SqliteStore,
    command: LedgerCommand,
) -> Result<Vec<String>, RelayError> {
    match command {
        LedgerCommand::Delete { message_id } => {
            let line = if store.soft_delete_message(&message_id).await? {
                tracing::info!(message_id = %message_id, "message soft-deleted");
                format!("deleted {message_id}")
            } else {
                format!("no visible message {message_id}")
            };
            Ok(vec![line])
        }
        LedgerCommand::List { pairing_id, limit } => {
            let messages = store.messages_for_pairing(&pairing_id, limit).await?;
            Ok(messages.iter().map(format_message).collect())
        }
    }
}

fn format_account(account: &ExternalAccount) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}",
        account.provider,
        account.external_id,
        if account.active { "active" } else { "inactive" },
        account.conversation_handle.as_deref().unwrap_or("-"),
        account.updated_at,
    )
}

fn format_message(message: &Message) -> String {
    format!(
        "{}\t{}\t{} {}\t{}\t{}",
        message.created_at,
        message.id,
        message.sender_type,
        message.sender_id,
        message.status,
        message.content,
    )
}
