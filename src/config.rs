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

//! Configuration types for the credential provider.
//!
//! This module provides the device identity handed to the TLS identity
//! builder and the endpoint configuration used by the credential client
//! and its cache.

use std::time::Duration;
use url::Url;

use crate::error::{CredentialError, Result};
use crate::types::credentials_path;

/// Default safety window subtracted from a credential's expiration.
pub const DEFAULT_SAFETY_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Default bound on TCP connect plus TLS handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default idle time before a pooled connection is closed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Default overall request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Certificate, private key and thing name of one device.
///
/// Immutable once constructed.
#[derive(Clone)]
pub struct DeviceIdentity {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
    thing_name: String,
}

impl DeviceIdentity {
    /// Create a new device identity from PEM-encoded data.
    pub fn new(
        cert_pem: impl Into<Vec<u8>>,
        key_pem: impl Into<Vec<u8>>,
        thing_name: impl Into<String>,
    ) -> Self {
        Self {
            cert_pem: cert_pem.into(),
            key_pem: key_pem.into(),
            thing_name: thing_name.into(),
        }
    }

    /// Create a device identity from file paths.
    pub fn from_files(
        cert_path: impl AsRef<std::path::Path>,
        key_path: impl AsRef<std::path::Path>,
        thing_name: impl Into<String>,
    ) -> std::io::Result<Self> {
        let cert_pem = std::fs::read(cert_path)?;
        let key_pem = std::fs::read(key_path)?;
        Ok(Self::new(cert_pem, key_pem, thing_name))
    }

    /// PEM-encoded certificate (chain).
    pub fn cert_pem(&self) -> &[u8] {
        &self.cert_pem
    }

    /// PEM-encoded private key.
    pub fn key_pem(&self) -> &[u8] {
        &self.key_pem
    }

    /// Thing name sent in the device-identity header.
    pub fn thing_name(&self) -> &str {
        &self.thing_name
    }
}

impl std::fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("thing_name", &self.thing_name)
            .field("cert_pem", &format_args!("{} bytes", self.cert_pem.len()))
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

/// Configuration for a credential endpoint client and its cache.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the credential-vending endpoint.
    pub endpoint: Url,

    /// Role alias to request credentials for.
    pub role_alias: String,

    /// Duration subtracted from the expiration to decide staleness.
    pub safety_window: Duration,

    /// Bound on TCP connect plus TLS handshake.
    pub connect_timeout: Duration,

    /// Idle time before a pooled connection is dropped.
    pub idle_timeout: Duration,

    /// Overall request timeout.
    pub request_timeout: Duration,
}

impl ProviderConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ProviderConfigBuilder {
        ProviderConfigBuilder::new()
    }

    /// Full URL of the credentials resource for the configured role alias.
    pub fn credentials_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.set_path(&credentials_path(&self.role_alias));
        url
    }
}

/// Builder for [`ProviderConfig`].
#[derive(Default)]
pub struct ProviderConfigBuilder {
    endpoint: Option<Url>,
    role_alias: Option<String>,
    safety_window: Option<Duration>,
    connect_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl ProviderConfigBuilder {
    /// Create a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint host name; the scheme is always `https`.
    pub fn endpoint_host(mut self, host: impl AsRef<str>) -> Result<Self> {
        let host = host.as_ref().trim_end_matches('/');
        self.endpoint = Some(Url::parse(&format!("https://{}", host))?);
        Ok(self)
    }

    /// Set the endpoint from a full base URL.
    pub fn endpoint_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.endpoint = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Set the role alias.
    pub fn role_alias(mut self, alias: impl Into<String>) -> Self {
        self.role_alias = Some(alias.into());
        self
    }

    /// Set the safety window.
    pub fn safety_window(mut self, window: Duration) -> Self {
        self.safety_window = Some(window);
        self
    }

    /// Set the connect/handshake timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the idle connection timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the overall request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or role alias is missing or invalid.
    pub fn build(self) -> Result<ProviderConfig> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| CredentialError::config("endpoint is required"))?;
        if !matches!(endpoint.scheme(), "https" | "http") || endpoint.host_str().is_none() {
            return Err(CredentialError::config(format!(
                "endpoint must be an http(s) URL with a host: {}",
                endpoint
            )));
        }

        let role_alias = self
            .role_alias
            .ok_or_else(|| CredentialError::config("role_alias is required"))?;
        if !is_valid_role_alias(&role_alias) {
            return Err(CredentialError::config(format!(
                "invalid role alias: {:?}",
                role_alias
            )));
        }

        Ok(ProviderConfig {
            endpoint,
            role_alias,
            safety_window: self.safety_window.unwrap_or(DEFAULT_SAFETY_WINDOW),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            idle_timeout: self.idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        })
    }
}

/// Returns true if `alias` can be used as a single path segment.
///
/// URL path normalization drops or collapses `.` and `..`, so both are
/// rejected along with empty aliases, `/`, backslash and `%`.
pub fn is_valid_role_alias(alias: &str) -> bool {
    !alias.is_empty()
        && alias != "."
        && alias != ".."
        && !alias.contains(|c| c == '/' || c == '\\' || c == '%')
}
