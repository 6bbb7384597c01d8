//! TLS identity construction for the credential endpoint.
//!
//! This module pairs a device certificate with its private key and pins
//! the server-side root of trust to an explicit trust anchor set. The
//! resulting configuration never consults a system or webpki root store.

use std::path::Path;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use rustls::{ClientConfig, RootCertStore};

use crate::config::{DeviceIdentity, ProviderConfig};
use crate::error::{CredentialError, Result};

/// Immutable set of trusted root certificates.
///
/// Created once at startup and shared by reference with every component
/// that builds a TLS configuration. Cloning is cheap.
#[derive(Clone)]
pub struct TrustAnchorSet {
    roots: Arc<RootCertStore>,
}

impl TrustAnchorSet {
    /// Parse one or more PEM-encoded root certificates.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::TrustAnchor`] if no certificate in the
    /// input can be decoded and added to the root set.
    pub fn from_pem(pem_data: &[u8]) -> Result<Self> {
        Self::from_pem_bundles([pem_data])
    }

    /// Parse several PEM bundles into a single root set.
    pub fn from_pem_bundles<'a>(bundles: impl IntoIterator<Item = &'a [u8]>) -> Result<Self> {
        let mut roots = RootCertStore::empty();

        for pem_data in bundles {
            let mut reader = std::io::BufReader::new(pem_data);
            for cert in rustls_pemfile::certs(&mut reader) {
                let cert = match cert {
                    Ok(cert) => cert,
                    Err(e) => {
                        tracing::warn!("Skipping undecodable trust anchor PEM block: {}", e);
                        continue;
                    }
                };
                if let Err(e) = roots.add(cert) {
                    tracing::warn!("Skipping unusable trust anchor: {}", e);
                }
            }
        }

        if roots.is_empty() {
            return Err(CredentialError::trust_anchor(
                "No valid root certificate found in trust anchor PEM",
            ));
        }

        tracing::debug!("Loaded {} trust anchor(s)", roots.len());
        Ok(Self {
            roots: Arc::new(roots),
        })
    }

    /// Read a PEM bundle from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem_data = std::fs::read(path).map_err(|e| {
            CredentialError::trust_anchor(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_pem(&pem_data)
    }

    /// Number of roots in the set.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Returns true if the set holds no roots. Never true for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    fn root_store(&self) -> Arc<RootCertStore> {
        Arc::clone(&self.roots)
    }
}

impl std::fmt::Debug for TrustAnchorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TrustAnchorSet({} roots)", self.roots.len())
    }
}

/// Build a mutual-TLS client configuration for a device identity.
///
/// The client presents the identity's certificate/key pair and verifies the
/// server chain against `trust_anchors` only.
///
/// # Errors
///
/// Returns [`CredentialError::Identity`] if the certificate or key cannot be
/// parsed or if the key does not belong to the certificate.
pub fn build_tls_config(
    identity: &DeviceIdentity,
    trust_anchors: &TrustAnchorSet,
) -> Result<Arc<ClientConfig>> {
    let certs = parse_pem_certificates(identity.cert_pem())
        .map_err(|e| CredentialError::identity(format!("Invalid client certificate: {}", e)))?;
    let key = parse_pem_private_key(identity.key_pem())
        .map_err(|e| CredentialError::identity(format!("Invalid private key: {}", e)))?;

    let provider = crypto_provider();
    check_key_matches(&provider, &certs, &key)?;

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| CredentialError::identity(format!("Unsupported TLS versions: {}", e)))?
        .with_root_certificates(trust_anchors.root_store())
        .with_client_auth_cert(certs, key)
        .map_err(|e| CredentialError::identity(format!("Failed to configure client auth: {}", e)))?;

    Ok(Arc::new(config))
}

/// Build a mutual-TLS client configuration straight from PEM inputs.
///
/// Trust anchor failures are reported before identity failures.
pub fn build_tls_config_from_pem(
    cert_pem: &[u8],
    key_pem: &[u8],
    trust_anchor_pem: &[u8],
) -> Result<Arc<ClientConfig>> {
    let trust_anchors = TrustAnchorSet::from_pem(trust_anchor_pem)?;
    let identity = DeviceIdentity::new(cert_pem, key_pem, "");
    build_tls_config(&identity, &trust_anchors)
}

/// Build a reqwest Client that speaks TLS using `tls_config` exclusively.
pub fn build_http_client(
    config: &ProviderConfig,
    tls_config: &ClientConfig,
) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .use_preconfigured_tls(tls_config.clone())
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.idle_timeout)
        .timeout(config.request_timeout)
        .user_agent(crate::USER_AGENT)
        .build()?;
    Ok(client)
}

/// Parse PEM-encoded certificates.
pub fn parse_pem_certificates(pem_data: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = std::io::BufReader::new(pem_data);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CredentialError::identity(format!("Failed to parse PEM: {}", e)))?;

    if certs.is_empty() {
        return Err(CredentialError::identity("No certificates found in PEM data"));
    }

    Ok(certs)
}

/// Parse a PEM-encoded private key (PKCS#8, PKCS#1 or SEC1).
pub fn parse_pem_private_key(pem_data: &[u8]) -> Result<PrivateKeyDer<'static>> {
    let mut reader = std::io::BufReader::new(pem_data);

    loop {
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(rustls_pemfile::Item::Pkcs8Key(key))) => {
                return Ok(PrivateKeyDer::Pkcs8(key));
            }
            Ok(Some(rustls_pemfile::Item::Pkcs1Key(key))) => {
                return Ok(PrivateKeyDer::Pkcs1(key));
            }
            Ok(Some(rustls_pemfile::Item::Sec1Key(key))) => {
                return Ok(PrivateKeyDer::Sec1(key));
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => {
                return Err(CredentialError::identity(format!("Failed to parse PEM: {}", e)));
            }
        }
    }

    Err(CredentialError::identity("No private key found in PEM data"))
}

fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::ring::default_provider()))
}

/// Reject a key that does not belong to the leaf certificate.
fn check_key_matches(
    provider: &CryptoProvider,
    certs: &[CertificateDer<'static>],
    key: &PrivateKeyDer<'static>,
) -> Result<()> {
    let signing_key = provider
        .key_provider
        .load_private_key(key.clone_key())
        .map_err(|e| CredentialError::identity(format!("Unsupported private key: {}", e)))?;

    match CertifiedKey::new(certs.to_vec(), signing_key).keys_match() {
        Ok(()) => Ok(()),
        // key type cannot expose its public half; the handshake will decide
        Err(rustls::Error::InconsistentKeys(rustls::InconsistentKeys::Unknown)) => {
            tracing::debug!("Could not compare private key with certificate");
            Ok(())
        }
        Err(e) => Err(CredentialError::identity(format!(
            "Private key does not match certificate: {}",
            e
        ))),
    }
}
