//! Credential-vending endpoint response parsing.

use serde::Deserialize;
use time::OffsetDateTime;

use super::TemporaryCredentials;
use crate::error::{CredentialError, Result};

/// Top-level JSON body returned by the credential-vending endpoint.
#[derive(Debug, Deserialize)]
pub struct CredentialsResponse {
    /// The vended credentials.
    pub credentials: EndpointCredentials,
}

/// The `credentials` object of a [`CredentialsResponse`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointCredentials {
    /// Access key identifier.
    pub access_key_id: String,

    /// Secret access key.
    pub secret_access_key: String,

    /// Session token.
    pub session_token: String,

    /// RFC 3339 expiration timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub expiration: OffsetDateTime,
}

impl std::fmt::Debug for EndpointCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

impl From<CredentialsResponse> for TemporaryCredentials {
    fn from(response: CredentialsResponse) -> Self {
        let c = response.credentials;
        TemporaryCredentials::new(
            c.access_key_id,
            c.secret_access_key,
            c.session_token,
            c.expiration,
        )
    }
}

/// Decode a credential-vending response body.
///
/// Any missing field, wrong type or unparseable timestamp is reported as
/// [`CredentialError::MalformedResponse`].
pub fn parse_credentials_response(body: &[u8]) -> Result<TemporaryCredentials> {
    let response: CredentialsResponse = serde_json::from_slice(body)
        .map_err(|e| CredentialError::malformed_response(e.to_string()))?;
    Ok(response.into())
}
