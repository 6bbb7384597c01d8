//! Provisioning endpoint response types.

use serde::Deserialize;

use crate::config::DeviceIdentity;
use crate::error::{CredentialError, Result};

/// Certificate and key pair issued by the provisioning endpoint.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedCertificate {
    /// ARN of the issued certificate.
    #[serde(default)]
    pub certificate_arn: String,

    /// Identifier of the issued certificate.
    #[serde(default)]
    pub certificate_id: String,

    /// PEM-encoded device certificate.
    pub certificate_pem: String,

    /// Generated key pair.
    pub key_pair: ProvisionedKeyPair,
}

/// Key pair portion of a [`ProvisionedCertificate`].
///
/// The service has been seen to emit both `privateKey` and `PrivateKey`
/// spellings, so both are accepted.
#[derive(Clone, Deserialize)]
pub struct ProvisionedKeyPair {
    /// PEM-encoded public key.
    #[serde(rename = "publicKey", alias = "PublicKey", default)]
    pub public_key: String,

    /// PEM-encoded private key.
    #[serde(rename = "privateKey", alias = "PrivateKey")]
    pub private_key: String,

    /// Optional root CA bundled with the response.
    #[serde(rename = "rootCA", alias = "RootCA", default)]
    pub root_ca: Option<String>,
}

impl ProvisionedCertificate {
    /// Decode a provisioning response body.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let cert: Self = serde_json::from_slice(body)
            .map_err(|e| CredentialError::malformed_response(e.to_string()))?;
        cert.check()?;
        Ok(cert)
    }

    fn check(&self) -> Result<()> {
        if self.certificate_pem.trim().is_empty() {
            return Err(CredentialError::malformed_response(
                "provisioning response has an empty certificatePem",
            ));
        }
        if self.key_pair.private_key.trim().is_empty() {
            return Err(CredentialError::malformed_response(
                "provisioning response has an empty privateKey",
            ));
        }
        Ok(())
    }

    /// Turn the issued material into a device identity.
    pub fn into_identity(self, thing_name: impl Into<String>) -> DeviceIdentity {
        DeviceIdentity::new(
            self.certificate_pem.into_bytes(),
            self.key_pair.private_key.into_bytes(),
            thing_name,
        )
    }
}

impl std::fmt::Debug for ProvisionedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionedCertificate")
            .field("certificate_arn", &self.certificate_arn)
            .field("certificate_id", &self.certificate_id)
            .finish_non_exhaustive()
    }
}
