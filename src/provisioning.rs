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

//! Device provisioning.
//!
//! This module exchanges a device serial number and PIN for a newly issued
//! certificate and private key. The provisioning endpoint is a public HTTPS
//! API, so unlike the credential endpoint it is verified against the
//! built-in web PKI roots.

use std::time::Duration;

use url::Url;

use crate::error::{CredentialError, Result};
use crate::types::ProvisionedCertificate;

/// Client for the device provisioning endpoint.
///
/// # Example
///
/// ```no_run
/// use iot_credential_provider::provisioning::ProvisioningClient;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ProvisioningClient::new(
///     "https://provisioning.example.com/LATEST/getcert",
///     Duration::from_secs(30),
/// )?;
///
/// let issued = client.provision("SN-0001", "123456").await?;
/// let identity = issued.into_identity("SN-0001");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ProvisioningClient {
    url: Url,
    http: reqwest::Client,
}

impl ProvisioningClient {
    /// Create a new provisioning client.
    pub fn new(url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url.as_ref())?;
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(true)
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()?;

        Ok(Self { url, http })
    }

    /// Provisioning endpoint URL, without device parameters.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request a certificate and key pair for a device.
    ///
    /// Performs exactly one request.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::Transport`] on network failure
    /// - [`CredentialError::Endpoint`] on a non-success status
    /// - [`CredentialError::MalformedResponse`] if the body cannot be decoded
    ///   or lacks the certificate or private key
    pub async fn provision(&self, serial_number: &str, pin: &str) -> Result<ProvisionedCertificate> {
        if serial_number.is_empty() || pin.is_empty() {
            return Err(CredentialError::config("serial number and PIN are required"));
        }

        let url = self.build_url(serial_number, pin);
        tracing::debug!("GET {} (serial {})", self.url, serial_number);

        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::endpoint(status.as_u16(), body));
        }

        let body = response.bytes().await?;
        let issued = ProvisionedCertificate::parse(&body)?;

        tracing::info!(
            certificate_id = %issued.certificate_id,
            "Provisioned certificate for {}",
            serial_number
        );
        Ok(issued)
    }

    fn build_url(&self, serial_number: &str, pin: &str) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("serialNumber", serial_number)
            .append_pair("deviceToken", pin);
        url
    }
}
