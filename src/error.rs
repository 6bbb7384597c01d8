//! Error types for credential provisioning and retrieval.
//!
//! Every failure is reported to the immediate caller. Nothing in this crate
//! retries on its own; callers that want backoff wrap the operation that
//! failed.

use thiserror::Error;

/// Result type alias using [`CredentialError`].
pub type Result<T> = std::result::Result<T, CredentialError>;

/// Errors that can occur while building identities or fetching credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The client certificate or private key could not be parsed, or the key
    /// does not belong to the certificate.
    #[error("Identity error: {0}")]
    Identity(String),

    /// The trust anchor PEM did not yield a usable root certificate.
    #[error("Trust anchor error: {0}")]
    TrustAnchor(String),

    /// Network or TLS handshake failure.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success HTTP status.
    #[error("Endpoint returned {status}: {body}")]
    Endpoint {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnosis.
        body: String,
    },

    /// The response body could not be decoded into the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Reading or writing persisted identity material failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request signing failed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CredentialError {
    /// Create an identity error with the given message.
    pub fn identity(msg: impl Into<String>) -> Self {
        Self::Identity(msg.into())
    }

    /// Create a trust anchor error with the given message.
    pub fn trust_anchor(msg: impl Into<String>) -> Self {
        Self::TrustAnchor(msg.into())
    }

    /// Create an endpoint error with status and body.
    pub fn endpoint(status: u16, body: impl Into<String>) -> Self {
        Self::Endpoint {
            status,
            body: body.into(),
        }
    }

    /// Create a malformed response error with the given message.
    pub fn malformed_response(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a storage error with the given message.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a signing error with the given message.
    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    /// Returns true for failures that abort initialization rather than a
    /// single fetch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Identity(_) | Self::TrustAnchor(_))
    }

    /// Returns the HTTP status if this is an endpoint error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Endpoint { status, .. } => Some(*status),
            _ => None,
        }
    }
}
