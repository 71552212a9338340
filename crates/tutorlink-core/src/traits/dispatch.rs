// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound dispatch adapter trait, one implementation per platform.

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Destination, DispatchReceipt, OutboundMessage, Provider, ReplyContext};

/// Sends messages to one external platform.
///
/// Adapters hold their own HTTP client and credentials and never touch the
/// store. When a platform needs a conversation handle the adapter opens one
/// if the [`Destination`] carries none and reports it in the receipt.
#[async_trait]
pub trait DispatchAdapter: PluginAdapter {
    /// The platform this adapter delivers to.
    fn provider(&self) -> Provider;

    /// Sends a text or image message and returns the platform message id.
    async fn send(
        &self,
        destination: &Destination,
        message: &OutboundMessage,
    ) -> Result<DispatchReceipt, DispatchError>;

    /// Sends a plain-text notice back into the session an inbound event came from.
    async fn notify(&self, reply: &ReplyContext, text: &str) -> Result<(), DispatchError>;
}
