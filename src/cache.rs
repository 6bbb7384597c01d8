// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Expiry-based caching of temporary credentials.
//!
//! This module wraps a [`CredentialSource`] with a single-entry cache. The
//! cached credentials are served until `now + safety_window` reaches their
//! expiration, after which the next access fetches synchronously.
//!
//! # Example
//!
//! ```no_run
//! use iot_credential_provider::cache::ExpiringCredentialCache;
//! use iot_credential_provider::{DeviceIdentity, ProviderConfig, TrustAnchorSet};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let trust_anchors = TrustAnchorSet::from_file("AmazonRootCA1.pem")?;
//! let identity = DeviceIdentity::from_files("cert.pem", "key.pem", "my-thing")?;
//! let config = ProviderConfig::builder()
//!     .endpoint_host("c2example.credentials.iot.us-east-1.amazonaws.com")?
//!     .role_alias("DeviceRole")
//!     .safety_window(Duration::from_secs(5 * 60))
//!     .build()?;
//!
//! let cache = ExpiringCredentialCache::from_config(config, &identity, &trust_anchors)?;
//!
//! // Fetches on first use, then serves the cached value until it nears expiry
//! let credentials = cache.get_credentials().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::client::CredentialEndpointClient;
use crate::config::{DeviceIdentity, ProviderConfig};
use crate::error::Result;
use crate::tls::TrustAnchorSet;
use crate::types::TemporaryCredentials;

/// Something that can produce a fresh set of temporary credentials.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Perform one fetch. Implementations must not retry.
    async fn fetch(&self) -> Result<TemporaryCredentials>;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> OffsetDateTime;
}

/// [`Clock`] backed by the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Single-entry cache of temporary credentials with a safety window.
///
/// The staleness check, the fetch and the update form one critical section,
/// so concurrent callers of [`get_credentials`](Self::get_credentials)
/// trigger at most one fetch and all observe the same result. A failed
/// fetch leaves the previous entry untouched and is reported to the caller;
/// stale credentials are never served in its place.
pub struct ExpiringCredentialCache<S> {
    source: S,
    safety_window: Duration,
    clock: Arc<dyn Clock>,
    current: Mutex<Option<TemporaryCredentials>>,
}

impl ExpiringCredentialCache<CredentialEndpointClient> {
    /// Build an endpoint client for `identity` and wrap it in a cache using
    /// the configured safety window.
    ///
    /// # Errors
    ///
    /// Fails if the identity cannot be used as a TLS client identity. Such
    /// failures are not recoverable for this identity.
    pub fn from_config(
        config: ProviderConfig,
        identity: &DeviceIdentity,
        trust_anchors: &TrustAnchorSet,
    ) -> Result<Self> {
        let safety_window = config.safety_window;
        let client = CredentialEndpointClient::new(config, identity, trust_anchors)?;
        Ok(Self::new(client, safety_window))
    }
}

impl<S: CredentialSource> ExpiringCredentialCache<S> {
    /// Create an empty cache around `source`.
    pub fn new(source: S, safety_window: Duration) -> Self {
        Self {
            source,
            safety_window,
            clock: Arc::new(SystemClock),
            current: Mutex::new(None),
        }
    }

    /// Replace the clock used for staleness decisions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The wrapped credential source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The configured safety window.
    pub fn safety_window(&self) -> Duration {
        self.safety_window
    }

    /// Return valid credentials, fetching if none are cached or the cached
    /// ones are within the safety window of their expiration.
    pub async fn get_credentials(&self) -> Result<TemporaryCredentials> {
        let mut current = self.current.lock().await;

        if let Some(credentials) = current.as_ref() {
            if !credentials.is_expired_at(self.clock.now(), self.safety_window) {
                trace!("Serving cached credentials");
                return Ok(credentials.clone());
            }
            debug!(
                expiration = %credentials.expiration,
                "Cached credentials are within the safety window, refreshing"
            );
        } else {
            debug!("No cached credentials, fetching");
        }

        let fresh = self.source.fetch().await?;

        if fresh.is_expired_at(self.clock.now(), self.safety_window) {
            warn!(
                expiration = %fresh.expiration,
                "Fetched credentials already fall inside the safety window"
            );
        } else {
            info!(expiration = %fresh.expiration, "Refreshed temporary credentials");
        }

        *current = Some(fresh.clone());
        Ok(fresh)
    }

    /// Discard the cached entry so the next access fetches.
    pub async fn expire(&self) {
        let mut current = self.current.lock().await;
        *current = None;
        debug!("Cached credentials expired on request");
    }

    /// Returns true if the next access would fetch.
    pub async fn is_expired(&self) -> bool {
        match self.current.lock().await.as_ref() {
            Some(credentials) => credentials.is_expired_at(self.clock.now(), self.safety_window),
            None => true,
        }
    }

    /// Peek at the cached entry without fetching, regardless of staleness.
    pub async fn cached(&self) -> Option<TemporaryCredentials> {
        self.current.lock().await.clone()
    }
}

impl<S> std::fmt::Debug for ExpiringCredentialCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringCredentialCache")
            .field("safety_window", &self.safety_window)
            .finish_non_exhaustive()
    }
}
