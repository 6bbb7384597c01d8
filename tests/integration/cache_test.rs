//! Integration tests for the expiring credential cache over a mock endpoint

use std::sync::Arc;
use std::time::Duration;

use crate::integration::{credentials_json, MockCredentialServer, TestCa, CREDENTIALS_JSON, THING_NAME};
use iot_credential_provider::{CredentialError, ExpiringCredentialCache};

#[tokio::test]
async fn test_repeated_access_fetches_once() {
    let mock = MockCredentialServer::start().await;
    mock.mock_credentials(CREDENTIALS_JSON, 1).await;

    let ca = TestCa::new("Test Root CA");
    let cache = ExpiringCredentialCache::from_config(
        mock.config(),
        &ca.device_identity(THING_NAME),
        &ca.anchors(),
    )
    .expect("Cache creation failed");

    let first = cache.get_credentials().await.unwrap();
    let second = cache.get_credentials().await.unwrap();
    let third = cache.get_credentials().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert!(!cache.is_expired().await);
}

#[tokio::test]
async fn test_concurrent_access_fetches_once() {
    let mock = MockCredentialServer::start().await;
    mock.mock_credentials(CREDENTIALS_JSON, 1).await;

    let ca = TestCa::new("Test Root CA");
    let cache = Arc::new(
        ExpiringCredentialCache::from_config(
            mock.config(),
            &ca.device_identity(THING_NAME),
            &ca.anchors(),
        )
        .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_credentials().await })
        })
        .collect();

    for handle in handles {
        let credentials = handle.await.unwrap().unwrap();
        assert_eq!(credentials.access_key_id, "ASIAEXAMPLE");
    }
}

#[tokio::test]
async fn test_stale_response_refetches_every_access() {
    let mock = MockCredentialServer::start().await;
    mock.mock_credentials(&credentials_json("2000-01-01T00:00:00Z"), 2)
        .await;

    let ca = TestCa::new("Test Root CA");
    let cache = ExpiringCredentialCache::from_config(
        mock.config(),
        &ca.device_identity(THING_NAME),
        &ca.anchors(),
    )
    .unwrap();

    cache.get_credentials().await.unwrap();
    assert!(cache.is_expired().await);
    cache.get_credentials().await.unwrap();
}

#[tokio::test]
async fn test_expire_forces_refetch() {
    let mock = MockCredentialServer::start().await;
    mock.mock_credentials(CREDENTIALS_JSON, 2).await;

    let ca = TestCa::new("Test Root CA");
    let cache = ExpiringCredentialCache::from_config(
        mock.config(),
        &ca.device_identity(THING_NAME),
        &ca.anchors(),
    )
    .unwrap();

    cache.get_credentials().await.unwrap();
    cache.expire().await;
    assert!(cache.cached().await.is_none());
    cache.get_credentials().await.unwrap();
}

#[tokio::test]
async fn test_endpoint_failure_is_surfaced() {
    let mock = MockCredentialServer::start().await;
    mock.mock_error(500, "internal").await;

    let ca = TestCa::new("Test Root CA");
    let cache = ExpiringCredentialCache::from_config(
        mock.config(),
        &ca.device_identity(THING_NAME),
        &ca.anchors(),
    )
    .unwrap();

    let err = cache.get_credentials().await.unwrap_err();
    assert!(matches!(err, CredentialError::Endpoint { status: 500, .. }));
    assert!(cache.cached().await.is_none());
}

#[tokio::test]
async fn test_safety_window_from_config() {
    let mock = MockCredentialServer::start().await;

    let ca = TestCa::new("Test Root CA");
    let mut config = mock.config();
    config.safety_window = Duration::from_secs(60);

    let cache = ExpiringCredentialCache::from_config(
        config,
        &ca.device_identity(THING_NAME),
        &ca.anchors(),
    )
    .unwrap();

    assert_eq!(cache.safety_window(), Duration::from_secs(60));
}
