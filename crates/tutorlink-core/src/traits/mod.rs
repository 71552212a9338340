// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod dispatch;
pub mod media;
pub mod store;

pub use adapter::PluginAdapter;
pub use dispatch::DispatchAdapter;
pub use media::MediaSource;
pub use store::RelayStore;
