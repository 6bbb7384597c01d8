//! Credential endpoint client.
//!
//! This module provides [`CredentialEndpointClient`], which exchanges a
//! device certificate for temporary credentials over mutual TLS.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use rustls::ClientConfig;

use crate::cache::CredentialSource;
use crate::config::{DeviceIdentity, ProviderConfig};
use crate::error::{CredentialError, Result};
use crate::tls::{build_http_client, build_tls_config, TrustAnchorSet};
use crate::types::{parse_credentials_response, TemporaryCredentials, THING_NAME_HEADER};

/// Client for the credential-vending endpoint.
///
/// Each call to [`retrieve`](Self::retrieve) performs exactly one HTTPS GET.
/// The client never retries; wrap it in an
/// [`ExpiringCredentialCache`](crate::cache::ExpiringCredentialCache) for
/// reuse and let the caller decide on retry policy.
///
/// # Example
///
/// ```no_run
/// use iot_credential_provider::{
///     CredentialEndpointClient, DeviceIdentity, ProviderConfig, TrustAnchorSet,
/// };
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let trust_anchors = TrustAnchorSet::from_file("AmazonRootCA1.pem")?;
/// let identity = DeviceIdentity::from_files("cert.pem", "key.pem", "my-thing")?;
///
/// let config = ProviderConfig::builder()
///     .endpoint_host("c2example.credentials.iot.us-east-1.amazonaws.com")?
///     .role_alias("DeviceRole")
///     .build()?;
///
/// let client = CredentialEndpointClient::new(config, &identity, &trust_anchors)?;
/// let credentials = client.retrieve().await?;
/// println!("Access key: {}", credentials.access_key_id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CredentialEndpointClient {
    config: ProviderConfig,
    thing_name: String,
    http: reqwest::Client,
}

impl CredentialEndpointClient {
    /// Create a client for `identity`, verifying the server against
    /// `trust_anchors`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Identity`] if the identity cannot be turned
    /// into a TLS client identity.
    pub fn new(
        config: ProviderConfig,
        identity: &DeviceIdentity,
        trust_anchors: &TrustAnchorSet,
    ) -> Result<Self> {
        let tls_config = build_tls_config(identity, trust_anchors)?;
        Self::with_tls_config(config, identity.thing_name(), tls_config)
    }

    /// Create a client from an already built TLS configuration.
    pub fn with_tls_config(
        config: ProviderConfig,
        thing_name: impl Into<String>,
        tls_config: Arc<ClientConfig>,
    ) -> Result<Self> {
        let thing_name = thing_name.into();
        if thing_name.is_empty() {
            return Err(CredentialError::config("thing name must not be empty"));
        }

        let http = build_http_client(&config, &tls_config)?;
        Ok(Self {
            config,
            thing_name,
            http,
        })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Thing name sent with every request.
    pub fn thing_name(&self) -> &str {
        &self.thing_name
    }

    /// Fetch a fresh set of temporary credentials.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::Transport`] on network or TLS handshake failure
    /// - [`CredentialError::Endpoint`] on a non-success status
    /// - [`CredentialError::MalformedResponse`] if the body cannot be decoded
    pub async fn retrieve(&self) -> Result<TemporaryCredentials> {
        let url = self.config.credentials_url();
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .header(THING_NAME_HEADER, &self.thing_name)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CredentialError::endpoint(status.as_u16(), body));
        }

        let body = response.bytes().await?;
        let credentials = parse_credentials_response(&body)?;

        tracing::info!(
            access_key_id = %credentials.access_key_id,
            expiration = %credentials.expiration,
            "Retrieved temporary credentials for {}",
            self.thing_name
        );

        Ok(credentials)
    }
}

#[async_trait]
impl CredentialSource for CredentialEndpointClient {
    async fn fetch(&self) -> Result<TemporaryCredentials> {
        self.retrieve().await
    }
}
