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

//! Credential and provisioning message types.
//!
//! This module provides the structured temporary credentials handed to
//! callers, plus the JSON wire shapes of the credential-vending and
//! provisioning endpoints.

mod endpoint;
mod provisioning;

pub use endpoint::{parse_credentials_response, CredentialsResponse, EndpointCredentials};
pub use provisioning::{ProvisionedCertificate, ProvisionedKeyPair};

use std::time::Duration;

use time::OffsetDateTime;

/// Provider name stamped on every set of credentials fetched from the
/// credential-vending endpoint.
pub const PROVIDER_NAME: &str = "IOTCredentialsEndpointProvider";

/// Short-lived access credentials vended for a device identity.
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryCredentials {
    /// Access key identifier.
    pub access_key_id: String,

    /// Secret access key.
    pub secret_access_key: String,

    /// Session token that must accompany the key pair.
    pub session_token: String,

    /// Instant after which the service rejects these credentials.
    pub expiration: OffsetDateTime,

    /// Name of the provider that produced these credentials.
    pub provider_name: String,
}

impl TemporaryCredentials {
    /// Create credentials stamped with [`PROVIDER_NAME`].
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
        expiration: OffsetDateTime,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.into(),
            expiration,
            provider_name: PROVIDER_NAME.to_string(),
        }
    }

    /// Returns true once `now + safety_window` has reached the expiration.
    pub fn is_expired_at(&self, now: OffsetDateTime, safety_window: Duration) -> bool {
        now + safety_window >= self.expiration
    }

    /// Time left before the credentials expire, or `None` if already expired.
    pub fn time_remaining(&self, now: OffsetDateTime) -> Option<Duration> {
        let remaining = self.expiration - now;
        if remaining.is_positive() {
            remaining.try_into().ok()
        } else {
            None
        }
    }
}

impl std::fmt::Debug for TemporaryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporaryCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiration", &self.expiration)
            .field("provider_name", &self.provider_name)
            .finish()
    }
}

/// Header carrying the device's thing name on credential requests.
pub const THING_NAME_HEADER: &str = "x-amzn-iot-thingname";

/// Build the credential-vending path for a role alias.
pub fn credentials_path(role_alias: &str) -> String {
    format!("/role-aliases/{}/credentials", role_alias)
}
