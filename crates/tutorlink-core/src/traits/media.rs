// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fetches inbound media that the platform only serves to authenticated bots.

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::types::{MediaContent, Provider};

/// Source of inbound media bytes, used by the public media proxy.
#[async_trait]
pub trait MediaSource: Send + Sync + 'static {
    fn provider(&self) -> Provider;

    /// Downloads the media identified by a platform id.
    ///
    /// A missing object maps to [`DispatchError::DestinationNotFound`].
    async fn fetch_media(&self, media_id: &str) -> Result<MediaContent, DispatchError>;
}
