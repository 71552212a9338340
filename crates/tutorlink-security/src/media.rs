// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signed media proxy links.
//!
//! Platform media ids are short and often sequential, so the proxy only
//! serves an id together with `sig = hex(HMAC(key, "{provider}/{id}"))`.

use std::fmt;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tutorlink_core::types::{Provider, media_proxy_url};

type HmacSha256 = Hmac<Sha256>;

/// Signs and checks media proxy links.
#[derive(Clone)]
pub struct MediaSigner {
    key: Arc<[u8]>,
}

impl MediaSigner {
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: Arc::from(key.as_ref()),
        }
    }

    fn mac(&self, provider: Provider, media_id: &str) -> HmacSha256 {
        let mut mac = match HmacSha256::new_from_slice(&self.key) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
        };
        mac.update(provider.to_string().as_bytes());
        mac.update(b"/");
        mac.update(media_id.as_bytes());
        mac
    }

    /// Hex signature for one media item.
    pub fn sign(&self, provider: Provider, media_id: &str) -> String {
        hex::encode(self.mac(provider, media_id).finalize().into_bytes())
    }

    /// Constant-time check of a link signature. A missing or non-hex
    /// signature never matches.
    pub fn verify(&self, provider: Provider, media_id: &str, signature: Option<&str>) -> bool {
        let Some(Ok(expected)) = signature.map(hex::decode) else {
            return false;
        };
        self.mac(provider, media_id).verify_slice(&expected).is_ok()
    }
}

impl fmt::Debug for MediaSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaSigner").field("key", &"[REDACTED]").finish()
    }
}

/// Builds signed proxy URLs under the public base URL.
#[derive(Debug, Clone)]
pub struct MediaLinks {
    base_url: String,
    signer: MediaSigner,
}

impl MediaLinks {
    pub fn new(base_url: impl Into<String>, signer: MediaSigner) -> Self {
        Self {
            base_url: base_url.into(),
            signer,
        }
    }

    pub fn url(&self, provider: Provider, media_id: &str) -> String {
        media_proxy_url(
            &self.base_url,
            provider,
            media_id,
            &self.signer.sign(provider, media_id),
        )
    }
}
