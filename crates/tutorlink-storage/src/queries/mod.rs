// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the relay's tables.

pub mod accounts;
pub mod messages;
pub mod pairings;
pub mod parties;
