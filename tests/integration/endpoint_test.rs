//! Integration tests for the credential endpoint client

use std::time::Duration;

use crate::integration::{credentials_json, MockCredentialServer, TestCa, THING_NAME};
use iot_credential_provider::{
    CredentialEndpointClient, CredentialError, ProviderConfig, TemporaryCredentials,
};
use time::macros::datetime;

fn client_for(mock: &MockCredentialServer, config: ProviderConfig) -> CredentialEndpointClient {
    let ca = TestCa::new("Test Root CA");
    let identity = ca.device_identity(THING_NAME);
    CredentialEndpointClient::new(config, &identity, &ca.anchors()).expect("Client creation failed")
}

#[tokio::test]
async fn test_successful_retrieval() {
    let mock = MockCredentialServer::start().await;
    mock.mock_credentials(crate::integration::CREDENTIALS_JSON, 1)
        .await;

    let client = client_for(&mock, mock.config());
    let credentials = client.retrieve().await.expect("retrieve failed");

    assert_eq!(
        credentials,
        TemporaryCredentials::new(
            "ASIAEXAMPLE",
            "secretExample",
            "tokenExample",
            datetime!(2099-01-01 0:00 UTC),
        )
    );
    assert_eq!(credentials.provider_name, "IOTCredentialsEndpointProvider");
}

#[tokio::test]
async fn test_fractional_and_offset_expiration() {
    let mock = MockCredentialServer::start().await;
    mock.mock_credentials(&credentials_json("2099-01-01T02:00:00.500+02:00"), 1)
        .await;

    let client = client_for(&mock, mock.config());
    let credentials = client.retrieve().await.expect("retrieve failed");

    assert_eq!(credentials.expiration, datetime!(2099-01-01 0:00:00.5 UTC));
}

#[tokio::test]
async fn test_forbidden_is_endpoint_error() {
    let mock = MockCredentialServer::start().await;
    mock.mock_error(403, r#"{"message":"Access Denied"}"#).await;

    let client = client_for(&mock, mock.config());
    let err = client.retrieve().await.unwrap_err();

    match err {
        CredentialError::Endpoint { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("Access Denied"));
        }
        other => panic!("Expected Endpoint error, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_endpoint_error() {
    let mock = MockCredentialServer::start().await;
    mock.mock_error(503, "").await;

    let client = client_for(&mock, mock.config());
    let err = client.retrieve().await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_missing_credentials_key_is_malformed() {
    let mock = MockCredentialServer::start().await;
    mock.mock_credentials(r#"{"somethingElse": {}}"#, 1).await;

    let client = client_for(&mock, mock.config());
    let err = client.retrieve().await.unwrap_err();

    assert!(
        matches!(err, CredentialError::MalformedResponse(_)),
        "Expected MalformedResponse, got: {:?}",
        err
    );
}

#[tokio::test]
async fn test_unparseable_expiration_is_malformed() {
    let mock = MockCredentialServer::start().await;
    mock.mock_credentials(&credentials_json("next tuesday"), 1)
        .await;

    let client = client_for(&mock, mock.config());
    let err = client.retrieve().await.unwrap_err();

    assert!(matches!(err, CredentialError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mock = MockCredentialServer::start().await;
    let config = ProviderConfig::builder()
        .endpoint_url(format!("http://127.0.0.1:{}", port))
        .unwrap()
        .role_alias("DeviceRole")
        .connect_timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let client = client_for(&mock, config);
    let err = client.retrieve().await.unwrap_err();

    assert!(
        matches!(err, CredentialError::Transport(_)),
        "Expected Transport error, got: {:?}",
        err
    );
}

#[tokio::test]
async fn test_request_timeout_is_transport_error() {
    let mock = MockCredentialServer::start().await;
    mock.mock_slow(Duration::from_secs(5)).await;

    let config = ProviderConfig::builder()
        .endpoint_url(mock.url())
        .unwrap()
        .role_alias("DeviceRole")
        .request_timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let client = client_for(&mock, config);
    let err = client.retrieve().await.unwrap_err();

    match err {
        CredentialError::Transport(e) => assert!(e.is_timeout()),
        other => panic!("Expected Transport error, got: {:?}", other),
    }
}
