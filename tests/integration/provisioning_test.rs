//! Integration tests for device provisioning and local storage

use std::time::Duration;

use crate::integration::{TestCa, THING_NAME};
use iot_credential_provider::{CertificateStore, CredentialError, ProvisioningClient};
use rcgen::ExtendedKeyUsagePurpose;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROVISIONING_PATH: &str = "/LATEST/getcert";

fn provisioning_body(cert_pem: &str, key_pem: &str) -> String {
    serde_json::json!({
        "certificateArn": "arn:aws:iot:us-east-1:123456789012:cert/abc123",
        "certificateId": "abc123",
        "certificatePem": cert_pem,
        "keyPair": {
            "PublicKey": "-----BEGIN PUBLIC KEY-----\n...\n-----END PUBLIC KEY-----\n",
            "PrivateKey": key_pem
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_provision_and_store() {
    let server = MockServer::start().await;
    let ca = TestCa::new("Device CA");
    let (cert_pem, key_pem) = ca.issue(THING_NAME, &[], ExtendedKeyUsagePurpose::ClientAuth);

    Mock::given(method("GET"))
        .and(path(PROVISIONING_PATH))
        .and(query_param("serialNumber", THING_NAME))
        .and(query_param("deviceToken", "123456"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(provisioning_body(&cert_pem, &key_pem)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = ProvisioningClient::new(
        format!("{}{}", server.uri(), PROVISIONING_PATH),
        Duration::from_secs(5),
    )
    .unwrap();

    let issued = client.provision(THING_NAME, "123456").await.unwrap();
    assert_eq!(issued.certificate_id, "abc123");
    assert_eq!(issued.key_pair.private_key, key_pem);

    let dir = TempDir::new().unwrap();
    let store = CertificateStore::new(dir.path());
    store
        .save(
            THING_NAME,
            issued.certificate_pem.as_bytes(),
            issued.key_pair.private_key.as_bytes(),
        )
        .unwrap();

    // The stored material must be usable as a TLS client identity
    let identity = store.load(THING_NAME).unwrap();
    assert_eq!(identity.thing_name(), THING_NAME);
    iot_credential_provider::tls::build_tls_config(&identity, &ca.anchors()).unwrap();
}

#[tokio::test]
async fn test_provision_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PROVISIONING_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad PIN"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ProvisioningClient::new(
        format!("{}{}", server.uri(), PROVISIONING_PATH),
        Duration::from_secs(5),
    )
    .unwrap();

    let err = client.provision("SN-1", "000000").await.unwrap_err();
    match err {
        CredentialError::Endpoint { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad PIN");
        }
        other => panic!("Expected Endpoint error, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_provision_missing_private_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PROVISIONING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"certificatePem": "-----BEGIN CERTIFICATE-----", "keyPair": {"PrivateKey": ""}}"#,
        ))
        .mount(&server)
        .await;

    let client = ProvisioningClient::new(
        format!("{}{}", server.uri(), PROVISIONING_PATH),
        Duration::from_secs(5),
    )
    .unwrap();

    let err = client.provision("SN-1", "000000").await.unwrap_err();
    assert!(matches!(err, CredentialError::MalformedResponse(_)));
}
