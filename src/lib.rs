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

//! # iot-credential-provider
//!
//! Exchange an X.509 device certificate for short-lived cloud credentials.
//!
//! A device that holds a certificate and private key presents them over
//! mutual TLS to an IoT credentials endpoint and receives temporary
//! credentials (access key id, secret access key, session token,
//! expiration) for the role behind a role alias. The credentials are cached
//! and transparently refreshed shortly before they expire.
//!
//! ## Features
//!
//! - **Pinned trust**: the endpoint is verified only against the supplied
//!   root CA(s), never the system store
//! - **Mutual TLS** with rustls
//! - **Single-flight cache**: concurrent callers share one refresh
//! - **Provisioning** of a device certificate from a serial number and PIN
//! - **SigV4 signing** of calls to the protected API
//!
//! ## Quick Start
//!
//! ```no_run
//! use iot_credential_provider::{
//!     DeviceIdentity, ExpiringCredentialCache, ProviderConfig, TrustAnchorSet,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let trust_anchors = TrustAnchorSet::from_file("AmazonRootCA1.pem")?;
//!     let identity = DeviceIdentity::from_files("cert.pem", "key.pem", "my-thing")?;
//!
//!     let config = ProviderConfig::builder()
//!         .endpoint_host("c2example.credentials.iot.us-east-1.amazonaws.com")?
//!         .role_alias("DeviceRole")
//!         .build()?;
//!
//!     let cache = ExpiringCredentialCache::from_config(config, &identity, &trust_anchors)?;
//!     let credentials = cache.get_credentials().await?;
//!     println!("{} expires at {}", credentials.access_key_id, credentials.expiration);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! Identity and trust anchor problems ([`CredentialError::is_fatal`]) cannot
//! be fixed by retrying. Transport, endpoint and malformed-response errors
//! may be transient; the library performs one attempt per call and leaves
//! retry policy to the caller.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod provisioning;
pub mod settings;
pub mod signing;
pub mod storage;
pub mod tls;
pub mod types;

// Re-export main types at crate root for convenience
pub use cache::{Clock, CredentialSource, ExpiringCredentialCache, SystemClock};
pub use client::CredentialEndpointClient;
pub use config::{DeviceIdentity, ProviderConfig, ProviderConfigBuilder};
pub use error::{CredentialError, Result};
pub use provisioning::ProvisioningClient;
pub use signing::{SigV4Signer, SignedClient};
pub use storage::CertificateStore;
pub use tls::TrustAnchorSet;
pub use types::{ProvisionedCertificate, TemporaryCredentials};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent string for HTTP requests.
pub const USER_AGENT: &str = concat!("iot-credential-provider/", env!("CARGO_PKG_VERSION"));
