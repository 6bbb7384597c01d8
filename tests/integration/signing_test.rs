//! Integration tests for signed calls to the protected API

use std::sync::Arc;
use std::time::Duration;

use crate::integration::{MockCredentialServer, TestCa, CREDENTIALS_JSON, THING_NAME};
use iot_credential_provider::{
    CredentialEndpointClient, CredentialError, ExpiringCredentialCache, SigV4Signer, SignedClient,
};
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

async fn signed_client(
    endpoint: &MockCredentialServer,
) -> SignedClient<CredentialEndpointClient> {
    let ca = TestCa::new("Test Root CA");
    let cache = ExpiringCredentialCache::from_config(
        endpoint.config(),
        &ca.device_identity(THING_NAME),
        &ca.anchors(),
    )
    .unwrap();

    SignedClient::new(
        Arc::new(cache),
        SigV4Signer::new("us-east-1", "execute-api"),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_signed_get() {
    let endpoint = MockCredentialServer::start().await;
    endpoint.mock_credentials(CREDENTIALS_JSON, 1).await;

    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Prod/hello"))
        .and(header("x-amz-security-token", "tokenExample"))
        .and(header_exists("x-amz-date"))
        .and(|request: &Request| {
            request
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(|v| {
                    v.starts_with("AWS4-HMAC-SHA256 Credential=ASIAEXAMPLE/")
                        && v.contains("/us-east-1/execute-api/aws4_request")
                        && v.contains("SignedHeaders=host;x-amz-date;x-amz-security-token")
                })
                .unwrap_or(false)
        })
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(2)
        .mount(&api)
        .await;

    let client = signed_client(&endpoint).await;

    for _ in 0..2 {
        let response = client.get(format!("{}/Prod/hello", api.uri())).await.unwrap();
        assert_eq!(response.text().await.unwrap(), "hello");
    }
}

#[tokio::test]
async fn test_signed_get_rejected() {
    let endpoint = MockCredentialServer::start().await;
    endpoint.mock_credentials(CREDENTIALS_JSON, 1).await;

    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("signature mismatch"))
        .mount(&api)
        .await;

    let client = signed_client(&endpoint).await;
    let err = client.get(api.uri()).await.unwrap_err();

    assert!(matches!(err, CredentialError::Endpoint { status: 403, .. }));
}

#[tokio::test]
async fn test_credential_failure_skips_api_call() {
    let endpoint = MockCredentialServer::start().await;
    endpoint.mock_error(403, "forbidden").await;

    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&api)
        .await;

    let client = signed_client(&endpoint).await;
    let err = client.get(api.uri()).await.unwrap_err();

    assert_eq!(err.status(), Some(403));
}
