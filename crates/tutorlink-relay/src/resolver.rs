// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account and pairing resolution.
//!
//! Both resolvers are pure lookups against the store. A miss is terminal for
//! the event: it reflects missing linking or pairing setup, not a fault that
//! a retry could fix.

use std::sync::Arc;

use tracing::debug;
use tutorlink_config::PairingFallbackMode;
use tutorlink_core::RelayStore;
use tutorlink_core::error::RelayError;
use tutorlink_core::types::{ExternalAccount, Pairing, PartyType, Provider};

/// Maps a platform identity to the party that owns it.
#[derive(Clone)]
pub struct AccountResolver {
    store: Arc<dyn RelayStore>,
}

impl AccountResolver {
    pub fn new(store: Arc<dyn RelayStore>) -> Self {
        Self { store }
    }

    /// Find the active account for a platform identity. With `expected`
    /// set, an account owned by the other party type counts as a miss.
    pub async fn resolve(
        &self,
        provider: Provider,
        external_id: &str,
        expected: Option<PartyType>,
    ) -> Result<ExternalAccount, RelayError> {
        let not_found = || RelayError::AccountNotFound {
            provider,
            external_id: external_id.to_string(),
        };
        let account = self
            .store
            .find_active_account(provider, external_id)
            .await?
            .ok_or_else(not_found)?;

        match expected {
            Some(party_type) if party_type != account.party_type => {
                debug!(
                    expected = %party_type,
                    actual = %account.party_type,
                    "account belongs to the other party type"
                );
                Err(not_found())
            }
            _ => Ok(account),
        }
    }
}

/// Rule that picks a pairing when neither a thread hint nor the inbound
/// conversation pins one.
pub trait PairingFallback: Send + Sync {
    fn name(&self) -> &'static str;

    /// Choose among the party's active pairings, most recently started first.
    fn choose(&self, candidates: Vec<Pairing>) -> Option<Pairing>;
}

/// Take the most recently started active pairing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MostRecentActive;

impl PairingFallback for MostRecentActive {
    fn name(&self) -> &'static str {
        "most_recent_active"
    }

    fn choose(&self, candidates: Vec<Pairing>) -> Option<Pairing> {
        candidates.into_iter().next()
    }
}

/// Refuse to guess when the party has more than one active pairing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAmbiguous;

impl PairingFallback for RejectAmbiguous {
    fn name(&self) -> &'static str {
        "reject_ambiguous"
    }

    fn choose(&self, mut candidates: Vec<Pairing>) -> Option<Pairing> {
        if candidates.len() == 1 {
            candidates.pop()
        } else {
            None
        }
    }
}

pub fn fallback_for(mode: PairingFallbackMode) -> Arc<dyn PairingFallback> {
    match mode {
        PairingFallbackMode::MostRecentActive => Arc::new(MostRecentActive),
        PairingFallbackMode::RejectAmbiguous => Arc::new(RejectAmbiguous),
    }
}

/// Finds the pairing an inbound message belongs to.
///
/// Resolution order:
/// 1. the thread hint, through the ledger row carrying it as correlation id;
/// 2. the conversation the message arrived in, when exactly one active
///    pairing of the sender has it cached;
/// 3. the configured [`PairingFallback`] over the sender's active pairings.
///
/// Candidates from steps 1 and 2 must be active and involve the sender,
/// otherwise they are skipped.
#[derive(Clone)]
pub struct PairingResolver {
    store: Arc<dyn RelayStore>,
    fallback: Arc<dyn PairingFallback>,
}

impl PairingResolver {
    pub fn new(store: Arc<dyn RelayStore>, fallback: Arc<dyn PairingFallback>) -> Self {
        Self { store, fallback }
    }

    pub async fn resolve(
        &self,
        account: &ExternalAccount,
        thread_hint: Option<&str>,
        conversation_handle: Option<&str>,
    ) -> Result<Pairing, RelayError> {
        if let Some(hint) = thread_hint
            && let Some(pairing) = self.from_thread_hint(account, hint).await?
        {
            debug!(pairing_id = %pairing.id, hint, "pairing resolved from thread hint");
            return Ok(pairing);
        }

        if let Some(handle) = conversation_handle {
            let mut matches: Vec<Pairing> = self
                .store
                .pairings_by_conversation_handle(account.provider, handle)
                .await?
                .into_iter()
                .filter(|p| p.is_active() && p.involves(&account.party_id, account.party_type))
                .collect();
            if matches.len() == 1
                && let Some(pairing) = matches.pop()
            {
                debug!(pairing_id = %pairing.id, "pairing resolved from conversation handle");
                return Ok(pairing);
            }
        }

        let candidates = self
            .store
            .active_pairings_for_party(&account.party_id, account.party_type)
            .await?;
        let count = candidates.len();
        match self.fallback.choose(candidates) {
            Some(pairing) => {
                debug!(
                    pairing_id = %pairing.id,
                    rule = self.fallback.name(),
                    candidates = count,
                    "pairing resolved by fallback"
                );
                Ok(pairing)
            }
            None => Err(RelayError::PairingNotFound {
                party_id: account.party_id.clone(),
                party_type: account.party_type,
            }),
        }
    }

    async fn from_thread_hint(
        &self,
        account: &ExternalAccount,
        hint: &str,
    ) -> Result<Option<Pairing>, RelayError> {
        let Some(message) = self.store.find_message_by_thread_id(hint).await? else {
            return Ok(None);
        };
        let pairing = self.store.get_pairing(&message.pairing_id).await?;
        Ok(pairing.filter(|p| {
            let usable = p.is_active() && p.involves(&account.party_id, account.party_type);
            if !usable {
                debug!(pairing_id = %p.id, "thread hint points at an unusable pairing");
            }
            usable
        }))
    }
}
