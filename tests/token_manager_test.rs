//! Tests for TokenManager expiry handling with a mocked Globus Auth.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use globus_share::models::{
    now_epoch_secs, CredentialRecord, TokenSet, AUTH_RESOURCE_SERVER, TRANSFER_RESOURCE_SERVER,
};
use globus_share::{CodePrompt, GlobusError, TokenManager, TokenStore};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use tempfile::TempDir;

/// Prompt returning a fixed code and counting how often it was asked.
struct FixedPrompt {
    code: &'static str,
    calls: Arc<AtomicUsize>,
}

impl CodePrompt for FixedPrompt {
    fn prompt_code(&self, authorize_url: &str) -> globus_share::Result<String> {
        assert!(authorize_url.contains("/v2/oauth2/authorize"));
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.code.to_string())
    }
}

fn prompt() -> (FixedPrompt, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (
        FixedPrompt {
            code: "pasted-code",
            calls: calls.clone(),
        },
        calls,
    )
}

fn transfer_tokens(access_token: &str, refresh_token: Option<&str>, expires_at: i64) -> TokenSet {
    let mut set = TokenSet::default();
    set.insert(CredentialRecord {
        resource_server: TRANSFER_RESOURCE_SERVER.to_string(),
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        expires_at,
        scope: "urn:globus:auth:scope:transfer.api.globus.org:all".to_string(),
    });
    set
}

fn login_response() -> serde_json::Value {
    json!({
        "access_token": "new-auth-at",
        "expires_in": 172800,
        "resource_server": "auth.globus.org",
        "refresh_token": "new-auth-rt",
        "scope": "openid profile email",
        "token_type": "Bearer",
        "other_tokens": [{
            "access_token": "new-transfer-at",
            "expires_in": 172800,
            "resource_server": "transfer.api.globus.org",
            "refresh_token": "new-transfer-rt",
            "scope": "urn:globus:auth:scope:transfer.api.globus.org:all",
            "token_type": "Bearer"
        }]
    })
}

fn setup(server: &ServerGuard, prompt: FixedPrompt) -> (TempDir, TokenStore, TokenManager<FixedPrompt>) {
    let dir = tempfile::tempdir().unwrap();
    let store = TokenStore::new(dir.path().join("globus-token.json"));
    let manager =
        TokenManager::new("app-uuid", store.clone(), prompt).with_auth_base_url(server.url());
    (dir, store, manager)
}

#[tokio::test]
async fn valid_token_is_reused_without_prompting() {
    let mut server = Server::new_async().await;
    let token_mock = server
        .mock("POST", "/v2/oauth2/token")
        .expect(0)
        .create_async()
        .await;

    let (prompt, calls) = prompt();
    let (_dir, store, manager) = setup(&server, prompt);

    let cached = transfer_tokens("cached-at", Some("cached-rt"), now_epoch_secs() + 3600);
    store.save(&cached).unwrap();

    let tokens = manager.ensure_valid().await.unwrap();

    assert_eq!(tokens, cached);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    token_mock.assert_async().await;
}

#[tokio::test]
async fn missing_file_triggers_login_and_is_written() {
    let mut server = Server::new_async().await;
    let token_mock = server
        .mock("POST", "/v2/oauth2/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "pasted-code".into()),
            Matcher::UrlEncoded("client_id".into(), "app-uuid".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(login_response().to_string())
        .expect(1)
        .create_async()
        .await;

    let (prompt, calls) = prompt();
    let (_dir, store, manager) = setup(&server, prompt);

    let tokens = manager.ensure_valid().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(tokens.transfer().unwrap().access_token, "new-transfer-at");
    assert_eq!(tokens.auth().unwrap().access_token, "new-auth-at");
    assert_eq!(store.load().unwrap(), Some(tokens));
    token_mock.assert_async().await;
}

#[tokio::test]
async fn expired_token_without_refresh_token_prompts_again() {
    let mut server = Server::new_async().await;
    let token_mock = server
        .mock("POST", "/v2/oauth2/token")
        .match_body(Matcher::UrlEncoded(
            "grant_type".into(),
            "authorization_code".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(login_response().to_string())
        .expect(1)
        .create_async()
        .await;

    let (prompt, calls) = prompt();
    let (_dir, store, manager) = setup(&server, prompt);
    store
        .save(&transfer_tokens("stale-at", None, now_epoch_secs() - 60))
        .unwrap();

    let tokens = manager.ensure_valid().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(tokens.transfer().unwrap().access_token, "new-transfer-at");
    let saved = store.load().unwrap().unwrap();
    assert_eq!(saved.transfer().unwrap().access_token, "new-transfer-at");
    token_mock.assert_async().await;
}

#[tokio::test]
async fn expired_token_is_refreshed_without_prompting() {
    let mut server = Server::new_async().await;
    let refresh_mock = server
        .mock("POST", "/v2/oauth2/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "stale-rt".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "access_token": "refreshed-at",
                "expires_in": 172800,
                "resource_server": "transfer.api.globus.org",
                "scope": "urn:globus:auth:scope:transfer.api.globus.org:all",
                "token_type": "Bearer"
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let (prompt, calls) = prompt();
    let (_dir, store, manager) = setup(&server, prompt);
    let before = now_epoch_secs();
    store
        .save(&transfer_tokens("stale-at", Some("stale-rt"), before - 60))
        .unwrap();

    let tokens = manager.ensure_valid().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let transfer = tokens.transfer().unwrap();
    assert_eq!(transfer.access_token, "refreshed-at");
    assert_eq!(transfer.refresh_token.as_deref(), Some("stale-rt"));
    assert!(transfer.expires_at >= before + 172800);
    assert_eq!(store.load().unwrap(), Some(tokens));
    refresh_mock.assert_async().await;
}

fn auth_record(access_token: &str, refresh_token: Option<&str>, expires_at: i64) -> CredentialRecord {
    CredentialRecord {
        resource_server: AUTH_RESOURCE_SERVER.to_string(),
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        expires_at,
        scope: "openid profile email".to_string(),
    }
}

fn refresh_mock_body(access_token: &str, resource_server: &str) -> String {
    json!({
        "access_token": access_token,
        "expires_in": 172800,
        "resource_server": resource_server,
        "token_type": "Bearer"
    })
    .to_string()
}

#[tokio::test]
async fn refresh_keeps_records_without_refresh_token() {
    let mut server = Server::new_async().await;
    let refresh_mock = server
        .mock("POST", "/v2/oauth2/token")
        .match_body(Matcher::UrlEncoded("refresh_token".into(), "stale-rt".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(refresh_mock_body("refreshed-at", TRANSFER_RESOURCE_SERVER))
        .expect(1)
        .create_async()
        .await;

    let (prompt, calls) = prompt();
    let (_dir, store, manager) = setup(&server, prompt);
    let mut cached = transfer_tokens("stale-at", Some("stale-rt"), now_epoch_secs() - 60);
    let auth = auth_record("auth-at", None, now_epoch_secs() + 3600);
    cached.insert(auth.clone());
    store.save(&cached).unwrap();

    let tokens = manager.ensure_valid().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(tokens.transfer().unwrap().access_token, "refreshed-at");
    assert_eq!(tokens.auth(), Some(&auth));

    let saved = store.load().unwrap().unwrap();
    let servers: Vec<&str> = saved.by_resource_server.keys().map(String::as_str).collect();
    assert_eq!(servers, vec![AUTH_RESOURCE_SERVER, TRANSFER_RESOURCE_SERVER]);
    assert_eq!(saved.auth(), Some(&auth));
    refresh_mock.assert_async().await;
}

#[tokio::test]
async fn every_record_with_refresh_token_is_refreshed() {
    let mut server = Server::new_async().await;
    let transfer_mock = server
        .mock("POST", "/v2/oauth2/token")
        .match_body(Matcher::UrlEncoded("refresh_token".into(), "transfer-rt".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(refresh_mock_body("refreshed-transfer-at", TRANSFER_RESOURCE_SERVER))
        .expect(1)
        .create_async()
        .await;
    let auth_mock = server
        .mock("POST", "/v2/oauth2/token")
        .match_body(Matcher::UrlEncoded("refresh_token".into(), "auth-rt".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(refresh_mock_body("refreshed-auth-at", AUTH_RESOURCE_SERVER))
        .expect(1)
        .create_async()
        .await;

    let (prompt, calls) = prompt();
    let (_dir, store, manager) = setup(&server, prompt);
    let mut cached = transfer_tokens("stale-at", Some("transfer-rt"), now_epoch_secs() - 60);
    cached.insert(auth_record("stale-auth-at", Some("auth-rt"), now_epoch_secs() - 60));
    store.save(&cached).unwrap();

    let tokens = manager.ensure_valid().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(tokens.transfer().unwrap().access_token, "refreshed-transfer-at");
    let auth = tokens.auth().unwrap();
    assert_eq!(auth.access_token, "refreshed-auth-at");
    assert_eq!(auth.refresh_token.as_deref(), Some("auth-rt"));
    assert_eq!(store.load().unwrap(), Some(tokens));
    transfer_mock.assert_async().await;
    auth_mock.assert_async().await;
}

#[tokio::test]
async fn failed_refresh_falls_back_to_prompt() {
    let mut server = Server::new_async().await;
    let refresh_mock = server
        .mock("POST", "/v2/oauth2/token")
        .match_body(Matcher::UrlEncoded(
            "grant_type".into(),
            "refresh_token".into(),
        ))
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "invalid_grant"}"#)
        .expect(1)
        .create_async()
        .await;
    let login_mock = server
        .mock("POST", "/v2/oauth2/token")
        .match_body(Matcher::UrlEncoded(
            "grant_type".into(),
            "authorization_code".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(login_response().to_string())
        .expect(1)
        .create_async()
        .await;

    let (prompt, calls) = prompt();
    let (_dir, store, manager) = setup(&server, prompt);
    store
        .save(&transfer_tokens("stale-at", Some("revoked-rt"), now_epoch_secs() - 60))
        .unwrap();

    let tokens = manager.ensure_valid().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(tokens.transfer().unwrap().access_token, "new-transfer-at");
    refresh_mock.assert_async().await;
    login_mock.assert_async().await;
}

#[tokio::test]
async fn rejected_code_is_an_error() {
    let mut server = Server::new_async().await;
    let _token_mock = server
        .mock("POST", "/v2/oauth2/token")
        .with_status(401)
        .with_body(r#"{"error": "invalid_grant"}"#)
        .create_async()
        .await;

    let (prompt, _calls) = prompt();
    let (_dir, store, manager) = setup(&server, prompt);

    let result = manager.ensure_valid().await;

    assert!(matches!(result, Err(GlobusError::TokenExchangeError(_))));
    assert!(store.load().unwrap().is_none());
}
