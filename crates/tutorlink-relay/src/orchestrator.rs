// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-event relay pipeline.
//!
//! An event moves through verified, account resolved, pairing resolved,
//! dispatched and logged. Any resolution miss ends it early with a notice to
//! the sender. Nothing here ever fails the inbound webhook: the caller
//! acknowledges every authenticated request, whatever the [`RelayOutcome`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{Instrument, debug, error, info, info_span, warn};
use tutorlink_config::model::RelayConfig;
use tutorlink_core::types::{
    DeliveryStatus, Destination, DispatchReceipt, ExternalAccount, IgnoreReason, InboundEvent,
    InboundMessage, Message, OutboundContent, OutboundMessage, Pairing, Provider,
};
use tutorlink_core::{DispatchAdapter, DispatchError, RelayError, RelayStore};

use crate::notice::Notice;
use crate::resolver::{AccountResolver, PairingFallback, PairingResolver, fallback_for};
use crate::retry::{Deadline, RetryPolicy, retry_dispatch, retry_with_deadline};

/// Terminal state of one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Not a user message; acknowledged and dropped.
    Ignored(IgnoreReason),
    /// Delivered and recorded as `sent`.
    Relayed {
        message_id: String,
        thread_id: String,
    },
    /// Dispatch failed after retries; recorded as `failed`.
    DeliveryFailed {
        message_id: String,
        error: DispatchError,
    },
    /// Resolution stopped the event; the sender got `notice` where possible.
    Unresolved(Notice),
    /// A store failure outlived its retries; the event is lost.
    Dropped,
}

impl RelayOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RelayOutcome::Ignored(_) => "ignored",
            RelayOutcome::Relayed { .. } => "relayed",
            RelayOutcome::DeliveryFailed { .. } => "delivery_failed",
            RelayOutcome::Unresolved(notice) => (*notice).into(),
            RelayOutcome::Dropped => "dropped",
        }
    }
}

/// Least time a ledger write gets, even once the request deadline has passed.
const LEDGER_WRITE_FLOOR: Duration = Duration::from_millis(250);

/// Wires resolvers, dispatch adapters and the ledger together.
pub struct Orchestrator {
    store: Arc<dyn RelayStore>,
    dispatchers: HashMap<Provider, Arc<dyn DispatchAdapter>>,
    accounts: AccountResolver,
    pairings: PairingResolver,
    retry: RetryPolicy,
    budget: Duration,
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    store: Arc<dyn RelayStore>,
    dispatchers: HashMap<Provider, Arc<dyn DispatchAdapter>>,
    fallback: Arc<dyn PairingFallback>,
    retry: RetryPolicy,
    budget: Duration,
}

impl OrchestratorBuilder {
    /// Register the adapter that delivers to its provider.
    pub fn dispatcher(mut self, adapter: Arc<dyn DispatchAdapter>) -> Self {
        self.dispatchers.insert(adapter.provider(), adapter);
        self
    }

    pub fn fallback(mut self, fallback: Arc<dyn PairingFallback>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn processing_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Apply retry, budget and fallback settings from config.
    pub fn config(self, config: &RelayConfig) -> Self {
        self.retry_policy(RetryPolicy::from_config(config))
            .processing_budget(Duration::from_millis(config.processing_budget_ms))
            .fallback(fallback_for(config.pairing_fallback))
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator {
            accounts: AccountResolver::new(self.store.clone()),
            pairings: PairingResolver::new(self.store.clone(), self.fallback),
            store: self.store,
            dispatchers: self.dispatchers,
            retry: self.retry,
            budget: self.budget,
        }
    }
}

/// Everything resolved about an event before dispatch.
struct Route {
    sender: ExternalAccount,
    pairing: Pairing,
    recipient: ExternalAccount,
}

impl Route {
    /// A pairing holds one handle per platform, which belongs to the
    /// recipient only when the two parties sit on different platforms.
    fn crosses_platforms(&self) -> bool {
        self.sender.provider != self.recipient.provider
    }

    fn pairing_handle(&self) -> Option<&str> {
        if self.crosses_platforms() {
            self.pairing.conversation_handle(self.recipient.provider)
        } else {
            None
        }
    }
}

impl Orchestrator {
    pub fn builder(store: Arc<dyn RelayStore>) -> OrchestratorBuilder {
        let defaults = RelayConfig::default();
        OrchestratorBuilder {
            store,
            dispatchers: HashMap::new(),
            fallback: fallback_for(defaults.pairing_fallback),
            retry: RetryPolicy::from_config(&defaults),
            budget: Duration::from_millis(defaults.processing_budget_ms),
        }
    }

    /// Time one inbound request may spend before it must be acknowledged.
    pub fn processing_budget(&self) -> Duration {
        self.budget
    }

    /// Process one normalized event under a deadline of its own.
    pub async fn handle(&self, event: InboundEvent) -> RelayOutcome {
        self.handle_within(event, &Deadline::after(self.budget)).await
    }

    /// Process one event under a deadline shared with the rest of its
    /// webhook request. Dispatch retries and notices stop at `deadline`.
    pub async fn handle_within(&self, event: InboundEvent, deadline: &Deadline) -> RelayOutcome {
        match event {
            InboundEvent::Ignored(reason) => {
                debug!(reason = %reason, "event ignored");
                RelayOutcome::Ignored(reason)
            }
            InboundEvent::Message(msg) => {
                let provider = msg.provider;
                let span = info_span!(
                    "relay",
                    provider = %provider,
                    external_id = %msg.sender_external_id,
                    pairing_id = tracing::field::Empty,
                );
                let outcome = self.relay(msg, deadline).instrument(span).await;
                tutorlink_prometheus::record_relay_outcome(provider, outcome.label());
                outcome
            }
        }
    }

    async fn relay(&self, msg: InboundMessage, deadline: &Deadline) -> RelayOutcome {
        let route = match self.resolve(&msg, deadline).await {
            Ok(route) => route,
            Err(outcome) => return outcome,
        };

        let content = match OutboundContent::try_from(&msg.content) {
            Ok(content) => content,
            Err(_) => {
                info!(
                    kind = msg.content.ledger_text(),
                    "unsupported message kind, not relayed"
                );
                return self.reject(&msg, Notice::UnsupportedKind, deadline).await;
            }
        };

        let sender_label = match self
            .store
            .party_display_name(&route.sender.party_id, route.sender.party_type)
            .await
        {
            Ok(name) => name,
            Err(e) => {
                warn!(error = %e, "display name lookup failed, sending unlabelled");
                None
            }
        };

        let destination = Destination {
            external_id: route.recipient.external_id.clone(),
            conversation_handle: route
                .recipient
                .conversation_handle
                .clone()
                .or_else(|| route.pairing_handle().map(str::to_string)),
        };
        let outbound = OutboundMessage {
            content,
            sender_label,
        };

        let dispatched = self
            .dispatch(route.recipient.provider, &destination, &outbound, deadline)
            .await;

        match dispatched {
            Ok(receipt) => {
                self.cache_handle(&route, &receipt).await;
                let row = ledger_row(
                    &msg,
                    &route,
                    DeliveryStatus::Sent,
                    Some(receipt.platform_message_id.clone()),
                );
                if !self.append(&row, deadline).await {
                    return RelayOutcome::Dropped;
                }
                info!(
                    message_id = %row.id,
                    thread_id = %receipt.platform_message_id,
                    "message relayed"
                );
                RelayOutcome::Relayed {
                    message_id: row.id,
                    thread_id: receipt.platform_message_id,
                }
            }
            Err(err) => {
                error!(
                    destination = %route.recipient.provider,
                    recipient = %route.recipient.external_id,
                    error = %err,
                    "delivery failed"
                );
                let row = ledger_row(&msg, &route, DeliveryStatus::Failed, None);
                let logged = self.append(&row, deadline).await;
                self.notify(&msg, Notice::for_dispatch_error(&err), deadline)
                    .await;
                if !logged {
                    return RelayOutcome::Dropped;
                }
                RelayOutcome::DeliveryFailed {
                    message_id: row.id,
                    error: err,
                }
            }
        }
    }

    /// Account, pairing, then the counterpart's account on a platform we can
    /// deliver to.
    async fn resolve(
        &self,
        msg: &InboundMessage,
        deadline: &Deadline,
    ) -> Result<Route, RelayOutcome> {
        let sender = match self
            .accounts
            .resolve(msg.provider, &msg.sender_external_id, None)
            .await
        {
            Ok(account) => account,
            Err(e) => return Err(self.resolution_failed(msg, e, deadline).await),
        };

        let pairing = match self
            .pairings
            .resolve(
                &sender,
                msg.thread_hint.as_deref(),
                msg.conversation_handle(),
            )
            .await
        {
            Ok(pairing) => pairing,
            Err(e) => return Err(self.resolution_failed(msg, e, deadline).await),
        };
        tracing::Span::current().record("pairing_id", pairing.id.as_str());

        let (counterpart_id, counterpart_type) = pairing.counterpart_of(sender.party_type);
        for provider in [msg.provider.other(), msg.provider] {
            if !self.dispatchers.contains_key(&provider) {
                continue;
            }
            match self
                .store
                .find_account_for_party(counterpart_id, counterpart_type, provider)
                .await
            {
                Ok(Some(recipient)) => {
                    return Ok(Route {
                        sender,
                        pairing,
                        recipient,
                    });
                }
                Ok(None) => {}
                Err(e) => return Err(self.resolution_failed(msg, e, deadline).await),
            }
        }

        let unlinked = RelayError::CounterpartUnlinked {
            pairing_id: pairing.id.clone(),
            provider: msg.provider.other(),
        };
        Err(self.resolution_failed(msg, unlinked, deadline).await)
    }

    async fn resolution_failed(
        &self,
        msg: &InboundMessage,
        err: RelayError,
        deadline: &Deadline,
    ) -> RelayOutcome {
        let notice = match &err {
            RelayError::AccountNotFound { .. } => Notice::AccountNotLinked,
            RelayError::PairingNotFound { .. } => Notice::NoActivePairing,
            RelayError::CounterpartUnlinked { .. } => Notice::CounterpartNotLinked,
            _ => {
                error!(error = %err, "store failure during resolution, event dropped");
                return RelayOutcome::Dropped;
            }
        };
        warn!(error = %err, "event not relayed");
        self.reject(msg, notice, deadline).await
    }

    async fn reject(
        &self,
        msg: &InboundMessage,
        notice: Notice,
        deadline: &Deadline,
    ) -> RelayOutcome {
        self.notify(msg, notice, deadline).await;
        RelayOutcome::Unresolved(notice)
    }

    /// Send a notice back on the inbound platform. Best effort, single
    /// attempt, and dropped rather than delaying the acknowledgement.
    async fn notify(&self, msg: &InboundMessage, notice: Notice, deadline: &Deadline) {
        let Some(adapter) = self.dispatchers.get(&msg.provider) else {
            warn!(notice = %notice, "no adapter for inbound platform, notice not sent");
            return;
        };
        if deadline.is_expired() {
            warn!(notice = %notice, "request deadline passed, notice not sent");
            return;
        }
        match tokio::time::timeout(deadline.remaining(), adapter.notify(&msg.reply, notice.text()))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(notice = %notice, error = %e, "failed to send notice"),
            Err(_) => warn!(notice = %notice, "notice cut off at request deadline"),
        }
    }

    async fn dispatch(
        &self,
        provider: Provider,
        destination: &Destination,
        message: &OutboundMessage,
        deadline: &Deadline,
    ) -> Result<DispatchReceipt, DispatchError> {
        let Some(adapter) = self.dispatchers.get(&provider) else {
            return Err(DispatchError::Rejected {
                provider,
                message: "no dispatch adapter registered".into(),
            });
        };

        let started = Instant::now();
        let outcome = retry_dispatch(&self.retry, deadline, provider, |attempt| async move {
            let result = adapter.send(destination, message).await;
            let label = match &result {
                Ok(_) => "ok",
                Err(DispatchError::Unavailable { .. }) => "unavailable",
                Err(DispatchError::InvalidCredentials { .. }) => "invalid_credentials",
                Err(DispatchError::DestinationNotFound { .. }) => "destination_not_found",
                Err(DispatchError::Rejected { .. }) => "rejected",
            };
            tutorlink_prometheus::record_dispatch_attempt(provider, label);
            if let Err(e) = &result {
                debug!(attempt, error = %e, "dispatch attempt failed");
            }
            result
        })
        .await;
        tutorlink_prometheus::record_dispatch_latency(provider, started.elapsed().as_secs_f64());
        debug!(attempts = outcome.attempts, "dispatch finished");
        outcome.result
    }

    /// Persist a newly opened conversation handle on the recipient's account
    /// and on the pairing. Failures only cost a lookup next time.
    async fn cache_handle(&self, route: &Route, receipt: &DispatchReceipt) {
        let Some(handle) = receipt.conversation_handle.as_deref() else {
            return;
        };
        let provider = route.recipient.provider;

        if route.recipient.conversation_handle.as_deref() != Some(handle) {
            debug!(handle, "caching conversation handle");
            if let Err(e) = self
                .store
                .set_account_conversation_handle(&route.recipient.id, handle)
                .await
            {
                warn!(error = %e, "failed to cache conversation handle on account");
            }
        }

        if route.crosses_platforms()
            && route.pairing_handle() != Some(handle)
            && let Err(e) = self
                .store
                .set_pairing_conversation_handle(&route.pairing.id, provider, handle)
                .await
        {
            warn!(error = %e, "failed to cache conversation handle on pairing");
        }
    }

    /// Append a ledger row, retrying store failures within the deadline.
    ///
    /// The row is written even when dispatch used up the deadline, so the
    /// write gets at least [`LEDGER_WRITE_FLOOR`].
    async fn append(&self, row: &Message, deadline: &Deadline) -> bool {
        let budget = self.budget;
        let write_deadline = deadline.at_least(LEDGER_WRITE_FLOOR);
        let outcome = retry_with_deadline(
            &self.retry,
            &write_deadline,
            |_: &RelayError| true,
            || RelayError::Timeout { duration: budget },
            |_| self.store.insert_message(row),
        )
        .await;

        match outcome.result {
            Ok(()) => true,
            Err(e) => {
                error!(
                    message_id = %row.id,
                    attempts = outcome.attempts,
                    error = %e,
                    "ledger write failed, event dropped"
                );
                false
            }
        }
    }
}

fn ledger_row(
    msg: &InboundMessage,
    route: &Route,
    status: DeliveryStatus,
    thread_id: Option<String>,
) -> Message {
    Message {
        id: uuid::Uuid::new_v4().to_string(),
        pairing_id: route.pairing.id.clone(),
        sender_id: route.sender.party_id.clone(),
        sender_type: route.sender.party_type,
        content: msg.content.ledger_text().to_string(),
        kind: msg.content.kind(),
        status,
        source_message_id: msg.source_message_id.clone(),
        thread_id,
        created_at: chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string(),
        deleted_at: None,
    }
}
