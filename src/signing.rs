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

//! Request signing with temporary credentials.
//!
//! This module signs outgoing requests with AWS Signature Version 4 and
//! provides [`SignedClient`], which pulls credentials from an
//! [`ExpiringCredentialCache`] for every call.
//!
//! # Example
//!
//! ```no_run
//! use iot_credential_provider::cache::ExpiringCredentialCache;
//! use iot_credential_provider::signing::{SigV4Signer, SignedClient};
//! use iot_credential_provider::{DeviceIdentity, ProviderConfig, TrustAnchorSet};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let trust_anchors = TrustAnchorSet::from_file("AmazonRootCA1.pem")?;
//! # let identity = DeviceIdentity::from_files("cert.pem", "key.pem", "my-thing")?;
//! # let config = ProviderConfig::builder()
//! #     .endpoint_host("c2example.credentials.iot.us-east-1.amazonaws.com")?
//! #     .role_alias("DeviceRole")
//! #     .build()?;
//! let cache = Arc::new(ExpiringCredentialCache::from_config(config, &identity, &trust_anchors)?);
//! let signer = SigV4Signer::new("us-east-1", "execute-api");
//! let client = SignedClient::new(cache, signer, Duration::from_secs(30))?;
//!
//! let response = client.get("https://api.example.com/Prod/hello").await?;
//! println!("{}", response.text().await?);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, HOST};
use sha2::{Digest, Sha256};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use url::Url;

use crate::cache::{CredentialSource, ExpiringCredentialCache};
use crate::error::{CredentialError, Result};
use crate::types::TemporaryCredentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const X_AMZ_DATE: &str = "x-amz-date";
const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

const AMZ_DATE: &[FormatItem<'static>] =
    format_description!("[year][month][day]T[hour][minute][second]Z");
const SHORT_DATE: &[FormatItem<'static>] = format_description!("[year][month][day]");

/// Characters left unescaped by SigV4 URI encoding.
const SIGV4_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// AWS Signature Version 4 request signer.
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    region: String,
    service: String,
}

impl SigV4Signer {
    /// Create a signer for a region and service name.
    pub fn new(region: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            service: service.into(),
        }
    }

    /// Signing region.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Signing service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Sign `request` in place.
    ///
    /// Sets `host`, `x-amz-date`, `x-amz-security-token` (when the
    /// credentials carry a session token) and `authorization`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Signing`] for streaming bodies or URLs
    /// without a host.
    pub fn sign(
        &self,
        request: &mut reqwest::Request,
        credentials: &TemporaryCredentials,
        time: OffsetDateTime,
    ) -> Result<()> {
        let time = time.to_offset(UtcOffset::UTC);
        let amz_date = time
            .format(AMZ_DATE)
            .map_err(|e| CredentialError::signing(e.to_string()))?;
        let date = time
            .format(SHORT_DATE)
            .map_err(|e| CredentialError::signing(e.to_string()))?;

        let host = host_header(request.url())?;
        let payload_hash = match request.body() {
            None => hex_sha256(b""),
            Some(body) => match body.as_bytes() {
                Some(bytes) => hex_sha256(bytes),
                None => return Err(CredentialError::signing("streaming bodies cannot be signed")),
            },
        };

        let headers = request.headers_mut();
        headers.insert(HOST, header_value(&host)?);
        headers.insert(HeaderName::from_static(X_AMZ_DATE), header_value(&amz_date)?);
        if credentials.session_token.is_empty() {
            headers.remove(X_AMZ_SECURITY_TOKEN);
        } else {
            headers.insert(
                HeaderName::from_static(X_AMZ_SECURITY_TOKEN),
                header_value(&credentials.session_token)?,
            );
        }

        let (canonical_headers, signed_headers) = canonical_headers(request.headers());
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            request.method().as_str(),
            canonical_uri(request.url()),
            canonical_query(request.url()),
            canonical_headers,
            signed_headers,
            payload_hash
        );
        tracing::trace!("Canonical request:\n{}", canonical_request);

        let scope = format!("{}/{}/{}/aws4_request", date, self.region, self.service);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = self.signing_key(&credentials.secret_access_key, &date)?;
        let signature = hex::encode(hmac(&signing_key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, credentials.access_key_id, scope, signed_headers, signature
        );
        request
            .headers_mut()
            .insert(AUTHORIZATION, header_value(&authorization)?);

        Ok(())
    }

    fn signing_key(&self, secret: &str, date: &str) -> Result<Vec<u8>> {
        let k_date = hmac(format!("AWS4{}", secret).as_bytes(), date.as_bytes())?;
        let k_region = hmac(&k_date, self.region.as_bytes())?;
        let k_service = hmac(&k_region, self.service.as_bytes())?;
        hmac(&k_service, b"aws4_request")
    }
}

/// HTTP client that signs every request with credentials from a cache.
pub struct SignedClient<S> {
    cache: Arc<ExpiringCredentialCache<S>>,
    signer: SigV4Signer,
    http: reqwest::Client,
}

impl<S: CredentialSource> SignedClient<S> {
    /// Create a signed client. The protected API is verified against the
    /// built-in web PKI roots.
    pub fn new(
        cache: Arc<ExpiringCredentialCache<S>>,
        signer: SigV4Signer,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(true)
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()?;

        Ok(Self {
            cache,
            signer,
            http,
        })
    }

    /// The signer in use.
    pub fn signer(&self) -> &SigV4Signer {
        &self.signer
    }

    /// Issue one signed GET.
    ///
    /// # Errors
    ///
    /// Credential errors from the cache are passed through unchanged. A
    /// non-success status is reported as [`CredentialError::Endpoint`].
    pub async fn get(&self, url: impl AsRef<str>) -> Result<reqwest::Response> {
        let url = Url::parse(url.as_ref())?;
        let credentials = self.cache.get_credentials().await?;

        let mut request = self.http.get(url).build()?;
        self.signer
            .sign(&mut request, &credentials, OffsetDateTime::now_utc())?;

        tracing::debug!("GET {} (signed)", request.url());
        let response = self.http.execute(request).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::endpoint(status.as_u16(), body));
        }

        Ok(response)
    }
}

impl<S> std::fmt::Debug for SignedClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedClient")
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| CredentialError::signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| CredentialError::signing(e.to_string()))
}

fn host_header(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| CredentialError::signing(format!("URL has no host: {}", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn sigv4_encode(s: &str) -> String {
    utf8_percent_encode(s, SIGV4_ENCODE_SET).to_string()
}

fn canonical_uri(url: &Url) -> String {
    let path = url.path();
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/').map(sigv4_encode).collect::<Vec<_>>().join("/")
}

fn sigv4_reencode(raw: &str) -> String {
    sigv4_encode(&percent_decode_str(raw).decode_utf8_lossy())
}

/// Built from the raw query rather than `query_pairs`, which would read `+`
/// as a space. A literal `+` is signed as `%2B`.
fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (sigv4_reencode(k), sigv4_reencode(v))
        })
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Returns the canonical header block and the signed header list.
fn canonical_headers(headers: &reqwest::header::HeaderMap) -> (String, String) {
    let mut names: Vec<&str> = headers
        .keys()
        .map(|name| name.as_str())
        .filter(|name| *name == "host" || *name == "content-type" || name.starts_with("x-amz-"))
        .collect();
    names.sort_unstable();
    names.dedup();

    let mut block = String::new();
    for name in &names {
        let values: Vec<String> = headers
            .get_all(*name)
            .iter()
            .map(|v| {
                String::from_utf8_lossy(v.as_bytes())
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        block.push_str(name);
        block.push(':');
        block.push_str(&values.join(","));
        block.push('\n');
    }

    (block, names.join(";"))
}
