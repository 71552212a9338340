// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sender-facing notices for events that could not be relayed.

use strum::{Display, IntoStaticStr};
use tutorlink_core::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Notice {
    AccountNotLinked,
    NoActivePairing,
    CounterpartNotLinked,
    DeliveryFailed,
    CounterpartNeedsAttention,
    UnsupportedKind,
}

impl Notice {
    pub fn text(self) -> &'static str {
        match self {
            Notice::AccountNotLinked => {
                "Your account is not linked yet. Please complete account linking before sending messages."
            }
            Notice::NoActivePairing => {
                "You have no active tutoring pairing, so this message was not delivered."
            }
            Notice::CounterpartNotLinked => {
                "Your message was not delivered because the other party has not linked their account yet."
            }
            Notice::DeliveryFailed => {
                "Your message could not be delivered right now. Please try again later."
            }
            Notice::CounterpartNeedsAttention => {
                "Your message could not be delivered because the other party's account needs attention."
            }
            Notice::UnsupportedKind => {
                "This type of message cannot be relayed. Please send text or an image."
            }
        }
    }

    /// Notice for a dispatch that finally failed.
    pub fn for_dispatch_error(err: &DispatchError) -> Notice {
        match err {
            DispatchError::InvalidCredentials { .. } | DispatchError::DestinationNotFound { .. } => {
                Notice::CounterpartNeedsAttention
            }
            DispatchError::Unavailable { .. } | DispatchError::Rejected { .. } => {
                Notice::DeliveryFailed
            }
        }
    }
}
