// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Settings file structures.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{
    is_valid_role_alias, ProviderConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_SAFETY_WINDOW,
};
use crate::error::{CredentialError, Result};

/// Complete settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Credential endpoint.
    pub endpoint: EndpointSettings,

    /// Trust anchors for the credential endpoint.
    pub trust: TrustSettings,

    /// Provisioning endpoint, needed only by `provision`.
    #[serde(default)]
    pub provisioning: Option<ProvisioningSettings>,

    /// Where device certificates and keys are kept.
    #[serde(default)]
    pub storage: StorageSettings,

    /// Protected API called with the temporary credentials.
    #[serde(default)]
    pub api: Option<ApiSettings>,
}

impl Settings {
    /// Parse settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or missing required fields.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| CredentialError::config(format!("Invalid TOML: {e}")))
    }

    /// Serialize settings to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CredentialError::config(format!("TOML serialize: {e}")))
    }

    /// Check the settings for completeness and consistency.
    ///
    /// All problems are reported in a single error.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        match (&self.endpoint.host, &self.endpoint.url) {
            (None, None) => errors.push("endpoint.host or endpoint.url is required".to_string()),
            (Some(_), Some(_)) => {
                errors.push("endpoint.host and endpoint.url are mutually exclusive".to_string())
            }
            (Some(host), None) if host.trim().is_empty() => {
                errors.push("endpoint.host must not be empty".to_string())
            }
            (None, Some(url)) if !url.starts_with("https://") && !url.starts_with("http://") => {
                errors.push("endpoint.url must be an http(s) URL".to_string())
            }
            _ => {}
        }

        if self.endpoint.role_alias.is_empty() {
            errors.push("endpoint.role_alias is required".to_string());
        } else if !is_valid_role_alias(&self.endpoint.role_alias) {
            errors.push(format!(
                "endpoint.role_alias {:?} is not a valid path segment",
                self.endpoint.role_alias
            ));
        }

        if self.endpoint.timeout_seconds == 0 {
            errors.push("endpoint.timeout_seconds must be > 0".to_string());
        }
        if self.endpoint.connect_timeout_seconds == 0 {
            errors.push("endpoint.connect_timeout_seconds must be > 0".to_string());
        }

        if self.trust.root_ca.as_os_str().is_empty() {
            errors.push("trust.root_ca is required".to_string());
        }

        if let Some(ref provisioning) = self.provisioning {
            if !provisioning.url.starts_with("https://") {
                errors.push("provisioning.url must use HTTPS".to_string());
            }
            if provisioning.timeout_seconds == 0 {
                errors.push("provisioning.timeout_seconds must be > 0".to_string());
            }
        }

        if let Some(ref api) = self.api {
            if api.url.is_empty() {
                errors.push("api.url is required".to_string());
            }
            if api.region.is_empty() {
                errors.push("api.region is required".to_string());
            }
            if api.service.is_empty() {
                errors.push("api.service must not be empty".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CredentialError::config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }

    /// Convert to a credential endpoint configuration.
    pub fn to_provider_config(&self) -> Result<ProviderConfig> {
        let mut builder = ProviderConfig::builder();

        builder = match (&self.endpoint.host, &self.endpoint.url) {
            (_, Some(url)) => builder.endpoint_url(url)?,
            (Some(host), None) => builder.endpoint_host(host)?,
            (None, None) => {
                return Err(CredentialError::config(
                    "endpoint.host or endpoint.url is required",
                ))
            }
        };

        builder
            .role_alias(&self.endpoint.role_alias)
            .safety_window(Duration::from_secs(self.endpoint.safety_window_seconds))
            .connect_timeout(Duration::from_secs(self.endpoint.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(self.endpoint.idle_timeout_seconds))
            .request_timeout(Duration::from_secs(self.endpoint.timeout_seconds))
            .build()
    }
}

/// Credential endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSettings {
    /// Account-specific credential endpoint host name.
    #[serde(default)]
    pub host: Option<String>,

    /// Full base URL, used instead of `host` for non-standard deployments.
    #[serde(default)]
    pub url: Option<String>,

    /// Role alias to exchange the certificate for.
    pub role_alias: String,

    /// Seconds before expiration at which cached credentials are refreshed.
    #[serde(default = "default_safety_window")]
    pub safety_window_seconds: u64,

    /// TCP connect and TLS handshake timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Idle pooled connection timeout in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,

    /// Total request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_safety_window() -> u64 {
    DEFAULT_SAFETY_WINDOW.as_secs()
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_idle_timeout() -> u64 {
    DEFAULT_IDLE_TIMEOUT.as_secs()
}

fn default_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

/// Trust anchor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustSettings {
    /// PEM file holding the root CA(s) that sign the endpoint certificate.
    pub root_ca: PathBuf,
}

/// Provisioning endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvisioningSettings {
    /// Provisioning endpoint URL.
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl ProvisioningSettings {
    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Certificate storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSettings {
    /// Directory holding `{serial}cer.pem` and `{serial}pri.pem`.
    #[serde(default = "default_storage_dir")]
    pub directory: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            directory: default_storage_dir(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("iot-creds"))
        .unwrap_or_else(|| PathBuf::from("certs"))
}

/// Protected API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiSettings {
    /// URL to GET with signed requests.
    pub url: String,

    /// Signing region.
    pub region: String,

    /// Signing service name.
    #[serde(default = "default_service")]
    pub service: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_service() -> String {
    "execute-api".to_string()
}
