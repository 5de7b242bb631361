//! Full lifecycle against a mock backend with tokens persisted on disk.

use std::fs;

use hytale_auth::auth::token::now_epoch;
use hytale_auth::auth::{OAuthTokens, TokenStoreExt};
use hytale_auth::config::AuthConfig;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("refresh_token=R0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A1",
            "refresh_token": "R1",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/my-account/get-profiles"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "profiles": [{ "uuid": "u1", "username": "Steve" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/game-session/new"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessionToken": "S1",
            "identityToken": "I1",
            "expiresAt": now_epoch() + 3600
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/game-session"))
        .and(header("authorization", "Bearer S1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    server
}

fn config_for(dir: &TempDir, server: &MockServer) -> AuthConfig {
    AuthConfig::new()
        .with_token_dir(dir.path())
        .with_oauth_base_url(server.uri())
        .with_account_data_url(server.uri())
        .with_sessions_url(server.uri())
}

#[tokio::test]
async fn stored_tokens_carry_a_server_from_start_to_shutdown() {
    let server = mock_backend().await;
    let dir = TempDir::new().unwrap();
    let config = config_for(&dir, &server);
    let auth = config.build_service().unwrap();
    auth.store()
        .save_oauth_tokens(&OAuthTokens::new("A0", "R0", now_epoch() + 60))
        .unwrap();

    let tokens = auth.ensure_downloader_auth().await.unwrap();
    assert_eq!(tokens.access_token, "A1");
    assert_eq!(tokens.refresh_token, "R1");

    let session = auth.ensure_valid_session(true).await.unwrap().unwrap();
    assert_eq!(session.session_token, "S1");

    let raw = fs::read_to_string(dir.path().join("session_tokens.json")).unwrap();
    let on_disk: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(on_disk["sessionToken"], "S1");
    assert_eq!(on_disk["identityToken"], "I1");

    let raw = fs::read_to_string(dir.path().join("selected_profile.json")).unwrap();
    let selected: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(selected["username"], "Steve");
    assert_eq!(selected["source"], "auto");

    let status = auth.status();
    assert_eq!(status.profile.as_deref(), Some("Steve"));

    auth.terminate_session().await;
    assert!(!dir.path().join("session_tokens.json").exists());
    assert!(dir.path().join("oauth_tokens.json").exists());

    auth.logout().unwrap();
    assert!(!dir.path().join("oauth_tokens.json").exists());
    assert!(!dir.path().join("profiles.json").exists());
    assert!(!dir.path().join("selected_profile.json").exists());
}

#[tokio::test]
async fn a_restarted_service_reuses_the_persisted_session() {
    let server = mock_backend().await;
    let dir = TempDir::new().unwrap();
    let config = config_for(&dir, &server);

    {
        let auth = config.build_service().unwrap();
        auth.store()
            .save_oauth_tokens(&OAuthTokens::new("A1", "R1", now_epoch() + 3600))
            .unwrap();
        auth.ensure_valid_session(true).await.unwrap().unwrap();
    }

    let restarted = config.build_service().unwrap();
    let session = restarted.ensure_valid_session(false).await.unwrap().unwrap();

    assert_eq!(session.session_token, "S1");
    let creations = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/game-session/new")
        .count();
    assert_eq!(creations, 1);
}
