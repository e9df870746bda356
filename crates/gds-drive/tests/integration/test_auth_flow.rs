//! Integration tests for the OAuth session and callback listener
//!
//! Verifies code exchange, token refresh, the stored-record merge, and the
//! single-shot callback listener against a mock token endpoint.

use std::sync::Arc;

use gds_core::GdsError;
use gds_drive::auth::CallbackListener;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_exchange_code_merges_response_into_stored_tokens() {
    let server = MockServer::start().await;
    common::mount_token_refresh(&server, "fresh-access").await;

    let dir = TempDir::new().unwrap();
    let mut config = common::drive_config(3127);
    config.google_auth.tokens = Some(common::stored_tokens(-60));
    let store = common::seeded_store(&dir, config.clone()).await;
    let session = common::mock_session(store.clone(), &config, &server);

    session
        .exchange_code("auth-code-abc")
        .await
        .expect("exchange failed");

    let stored = store.read().await.unwrap().google_auth.tokens.unwrap();
    assert_eq!(stored.access_token, "fresh-access");
    // Fields the response omitted are retained from the stored record
    assert_eq!(stored.refresh_token.as_deref(), Some("stored-refresh"));
    assert_eq!(stored.id_token.as_deref(), Some("stored-id-token"));
    assert!(stored.expiry_date > chrono::Utc::now().timestamp_millis());
}

#[tokio::test]
async fn test_exchange_code_failure_maps_to_exchange_error() {
    let server = MockServer::start().await;
    common::mount_token_error(&server).await;

    let dir = TempDir::new().unwrap();
    let config = common::drive_config(3127);
    let store = common::seeded_store(&dir, config.clone()).await;
    let session = common::mock_session(store.clone(), &config, &server);

    let err = session.exchange_code("expired-code").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GdsError>(),
        Some(GdsError::AuthExchangeFailed(_))
    ));
    assert!(err.to_string().contains("invalid_grant"));

    // Nothing was persisted
    assert!(store.read().await.unwrap().google_auth.tokens.is_none());
}

#[tokio::test]
async fn test_access_token_uses_stored_token_while_fresh() {
    let server = MockServer::start().await;

    let dir = TempDir::new().unwrap();
    let mut config = common::drive_config(3127);
    config.google_auth.tokens = Some(common::stored_tokens(3600));
    let store = common::seeded_store(&dir, config.clone()).await;
    let session = common::mock_session(store.clone(), &config, &server);

    let token = session.access_token().await.expect("access_token failed");
    assert_eq!(token, "stored-access");

    // No request ever reached the token endpoint
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_access_token_refreshes_expired_token_and_persists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=stored-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "refreshed-access",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = common::drive_config(3127);
    config.google_auth.tokens = Some(common::stored_tokens(-3600));
    let store = common::seeded_store(&dir, config.clone()).await;
    let session = common::mock_session(store.clone(), &config, &server);

    let token = session.access_token().await.expect("refresh failed");
    assert_eq!(token, "refreshed-access");

    // The refreshed record was persisted before the token was returned,
    // with the refresh token carried over
    let stored = store.read().await.unwrap().google_auth.tokens.unwrap();
    assert_eq!(stored.access_token, "refreshed-access");
    assert_eq!(stored.refresh_token.as_deref(), Some("stored-refresh"));
}

#[tokio::test]
async fn test_access_token_refreshes_token_expiring_within_margin() {
    let server = MockServer::start().await;
    common::mount_token_refresh(&server, "refreshed-access").await;

    let dir = TempDir::new().unwrap();
    let mut config = common::drive_config(3127);
    // Still valid, but inside the refresh margin
    config.google_auth.tokens = Some(common::stored_tokens(30));
    let store = common::seeded_store(&dir, config.clone()).await;
    let session = common::mock_session(store.clone(), &config, &server);

    let token = session.access_token().await.expect("refresh failed");
    assert_eq!(token, "refreshed-access");
}

#[tokio::test]
async fn test_callback_listener_exchanges_code_and_persists_tokens() {
    let server = MockServer::start().await;
    common::mount_token_exchange(&server).await;

    let dir = TempDir::new().unwrap();
    let port = common::free_port().await;
    let config = common::drive_config(port);
    let store = common::seeded_store(&dir, config.clone()).await;
    assert!(!store.read().await.unwrap().is_authenticated());

    let session = Arc::new(common::mock_session(store.clone(), &config, &server));
    let listener = tokio::spawn(CallbackListener::listen(port, Arc::clone(&session)));

    let client = reqwest::Client::new();
    let response =
        common::request_callback(&client, port, "/auth/google/callback?code=abc").await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "Ok");

    let tokens = listener
        .await
        .expect("listener task panicked")
        .expect("listener returned an error");
    assert_eq!(tokens.access_token, "exchanged-access");
    assert_eq!(tokens.refresh_token.as_deref(), Some("exchanged-refresh"));
    assert_eq!(tokens.id_token.as_deref(), Some("exchanged-id-token"));

    let stored = store.read().await.unwrap();
    assert!(stored.is_authenticated());
    assert_eq!(
        stored.google_auth.tokens.unwrap().access_token,
        "exchanged-access"
    );
}

#[tokio::test]
async fn test_callback_listener_ignores_requests_without_a_code() {
    let server = MockServer::start().await;
    common::mount_token_exchange(&server).await;

    let dir = TempDir::new().unwrap();
    let port = common::free_port().await;
    let config = common::drive_config(port);
    let store = common::seeded_store(&dir, config.clone()).await;

    let session = Arc::new(common::mock_session(store.clone(), &config, &server));
    let listener = tokio::spawn(CallbackListener::listen(port, Arc::clone(&session)));

    // A request without a code is answered but does not resolve the flow;
    // read the body fully so the connection goes back to the pool
    let client = reqwest::Client::new();
    let first = common::request_callback(&client, port, "/favicon.ico").await;
    let first_status = first.status();
    let first_body = first.text().await.unwrap();
    assert_eq!(first_status, 400);
    assert_eq!(first_body, "Missing authorization code");

    // The real redirect arrives on the same kept-alive connection
    let second =
        common::request_callback(&client, port, "/auth/google/callback?code=abc").await;
    assert_eq!(second.status(), 200);

    let tokens = listener
        .await
        .expect("listener task panicked")
        .expect("listener returned an error");
    assert_eq!(tokens.access_token, "exchanged-access");
    assert!(store.read().await.unwrap().is_authenticated());
}

#[tokio::test]
async fn test_callback_listener_survives_stray_connections() {
    let server = MockServer::start().await;
    common::mount_token_exchange(&server).await;

    let dir = TempDir::new().unwrap();
    let port = common::free_port().await;
    let config = common::drive_config(port);
    let store = common::seeded_store(&dir, config.clone()).await;

    let session = Arc::new(common::mock_session(store.clone(), &config, &server));
    let listener = tokio::spawn(CallbackListener::listen(port, Arc::clone(&session)));

    // A speculative socket that opens first and closes without sending a
    // request must not consume the flow
    let stray = loop {
        match tokio::net::TcpStream::connect(("127.0.0.1", port)).await {
            Ok(stream) => break stream,
            Err(_) => tokio::time::sleep(std::time::Duration::from_millis(20)).await,
        }
    };
    drop(stray);

    // Neither may a favicon fetch arriving on its own connection, which
    // stays idle in this client's pool afterwards
    let favicon_client = reqwest::Client::new();
    let favicon = common::request_callback(&favicon_client, port, "/favicon.ico").await;
    assert_eq!(favicon.status(), 400);

    // The redirect arrives on yet another connection
    let redirect_client = reqwest::Client::new();
    let response =
        common::request_callback(&redirect_client, port, "/auth/google/callback?code=abc").await;
    assert_eq!(response.status(), 200);

    let tokens = listener
        .await
        .expect("listener task panicked")
        .expect("listener returned an error");
    assert_eq!(tokens.access_token, "exchanged-access");
    assert!(store.read().await.unwrap().is_authenticated());
}

#[tokio::test]
async fn test_callback_listener_surfaces_exchange_failure() {
    let server = MockServer::start().await;
    common::mount_token_error(&server).await;

    let dir = TempDir::new().unwrap();
    let port = common::free_port().await;
    let config = common::drive_config(port);
    let store = common::seeded_store(&dir, config.clone()).await;

    let session = Arc::new(common::mock_session(store.clone(), &config, &server));
    let listener = tokio::spawn(CallbackListener::listen(port, Arc::clone(&session)));

    let client = reqwest::Client::new();
    let response =
        common::request_callback(&client, port, "/auth/google/callback?code=bad").await;
    assert_eq!(response.status(), 502);
    assert_eq!(response.text().await.unwrap(), "Authorization exchange failed");

    let err = listener
        .await
        .expect("listener task panicked")
        .expect_err("listener should surface the exchange failure");
    assert!(matches!(
        err.downcast_ref::<GdsError>(),
        Some(GdsError::AuthExchangeFailed(_))
    ));
    assert!(!store.read().await.unwrap().is_authenticated());
}
