//! Integration test utilities and helpers
//!
//! This module provides common test infrastructure for the credential
//! provider integration tests: a wiremock-backed credential endpoint, a
//! throw-away PKI generated with rcgen, and a minimal TLS server for
//! handshake tests.

#![allow(dead_code)]

use std::sync::Arc;

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use iot_credential_provider::tls::{parse_pem_certificates, parse_pem_private_key};
use iot_credential_provider::{DeviceIdentity, ProviderConfig, TrustAnchorSet};

pub const ROLE_ALIAS: &str = "DeviceRole";
pub const THING_NAME: &str = "thing-0001";
pub const CREDENTIALS_PATH: &str = "/role-aliases/DeviceRole/credentials";

/// Credentials body that stays valid until 2099.
pub const CREDENTIALS_JSON: &str = r#"{
  "credentials": {
    "accessKeyId": "ASIAEXAMPLE",
    "secretAccessKey": "secretExample",
    "sessionToken": "tokenExample",
    "expiration": "2099-01-01T00:00:00Z"
  }
}"#;

/// Mock credential endpoint for integration tests
pub struct MockCredentialServer {
    server: MockServer,
}

impl MockCredentialServer {
    /// Start a new mock server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL of the mock server
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Inner MockServer for custom mocking
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Provider configuration pointing at this server
    pub fn config(&self) -> ProviderConfig {
        ProviderConfig::builder()
            .endpoint_url(self.url())
            .expect("Valid URL")
            .role_alias(ROLE_ALIAS)
            .build()
            .expect("Valid config")
    }

    /// Serve `body` for requests carrying the expected thing name, `times` times
    pub async fn mock_credentials(&self, body: &str, times: u64) {
        Mock::given(method("GET"))
            .and(path(CREDENTIALS_PATH))
            .and(header("x-amzn-iot-thingname", THING_NAME))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .insert_header("Content-Type", "application/json"),
            )
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Respond to credential requests with an error status
    pub async fn mock_error(&self, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(CREDENTIALS_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Respond after a delay
    pub async fn mock_slow(&self, delay: std::time::Duration) {
        Mock::given(method("GET"))
            .and(path(CREDENTIALS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(CREDENTIALS_JSON)
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }
}

/// Credentials body with a custom expiration
pub fn credentials_json(expiration: &str) -> String {
    CREDENTIALS_JSON.replace("2099-01-01T00:00:00Z", expiration)
}

/// Certificate authority generated for one test
pub struct TestCa {
    cert: Certificate,
    key: KeyPair,
}

impl TestCa {
    /// Generate a self-signed CA
    pub fn new(name: &str) -> Self {
        let key = KeyPair::generate().expect("CA key generation");
        let mut params = CertificateParams::new(Vec::<String>::new()).expect("CA params");
        params.distinguished_name.push(DnType::CommonName, name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let cert = params.self_signed(&key).expect("CA self-sign");
        Self { cert, key }
    }

    /// CA certificate in PEM form
    pub fn pem(&self) -> String {
        self.cert.pem()
    }

    /// Trust anchor set holding only this CA
    pub fn anchors(&self) -> TrustAnchorSet {
        TrustAnchorSet::from_pem(self.pem().as_bytes()).expect("Valid anchor")
    }

    /// Issue a leaf certificate, returning (cert PEM, key PEM)
    pub fn issue(&self, common_name: &str, sans: &[&str], usage: ExtendedKeyUsagePurpose) -> (String, String) {
        let key = KeyPair::generate().expect("Leaf key generation");
        let mut params = CertificateParams::new(
            sans.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        )
        .expect("Leaf params");
        params.distinguished_name.push(DnType::CommonName, common_name);
        params.extended_key_usages = vec![usage];
        let cert = params
            .signed_by(&key, &self.cert, &self.key)
            .expect("Leaf signing");
        (cert.pem(), key.serialize_pem())
    }

    /// Device identity issued by this CA
    pub fn device_identity(&self, thing_name: &str) -> DeviceIdentity {
        let (cert, key) = self.issue(thing_name, &[], ExtendedKeyUsagePurpose::ClientAuth);
        DeviceIdentity::new(cert.into_bytes(), key.into_bytes(), thing_name)
    }

    /// Server configuration for 127.0.0.1, optionally requiring client certificates from `client_ca`
    pub fn server_config(&self, client_ca: Option<&TestCa>) -> rustls::ServerConfig {
        let (cert_pem, key_pem) = self.issue(
            "localhost",
            &["localhost", "127.0.0.1"],
            ExtendedKeyUsagePurpose::ServerAuth,
        );
        let certs = parse_pem_certificates(cert_pem.as_bytes()).expect("Server cert");
        let key = parse_pem_private_key(key_pem.as_bytes()).expect("Server key");

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = rustls::ServerConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .expect("Protocol versions");

        let builder = match client_ca {
            Some(ca) => {
                let mut roots = rustls::RootCertStore::empty();
                for cert in parse_pem_certificates(ca.pem().as_bytes()).expect("Client CA") {
                    roots.add(cert).expect("Client CA root");
                }
                let verifier = rustls::server::WebPkiClientVerifier::builder_with_provider(
                    Arc::new(roots),
                    provider,
                )
                .build()
                .expect("Client verifier");
                builder.with_client_cert_verifier(verifier)
            }
            None => builder.with_no_client_auth(),
        };

        builder
            .with_single_cert(certs, key)
            .expect("Server certificate")
    }
}

/// Serve one HTTP/1.1 response over TLS on 127.0.0.1.
///
/// Returns the port and a handle resolving to the raw request head.
pub async fn spawn_tls_server(
    config: rustls::ServerConfig,
    status_line: &str,
    body: &str,
) -> (u16, JoinHandle<std::io::Result<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Bind");
    let port = listener.local_addr().expect("Local addr").port();
    let acceptor = TlsAcceptor::from(Arc::new(config));
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
    );

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        let mut tls = acceptor.accept(stream).await?;

        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = tls.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        tls.write_all(response.as_bytes()).await?;
        tls.shutdown().await?;
        Ok(String::from_utf8_lossy(&request).into_owned())
    });

    (port, handle)
}

/// Provider configuration for a TLS server on 127.0.0.1
pub fn local_tls_config(port: u16) -> ProviderConfig {
    ProviderConfig::builder()
        .endpoint_url(format!("https://127.0.0.1:{}", port))
        .expect("Valid URL")
        .role_alias(ROLE_ALIAS)
        .connect_timeout(std::time::Duration::from_secs(5))
        .request_timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("Valid config")
}
