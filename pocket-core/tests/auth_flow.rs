//! Integration tests for the authorization flow.
//!
//! These tests verify that AuthFlow:
//! - Returns a cached authorization without touching the network
//! - Runs request, prompt, callback, exchange and save in order on a cache miss
//! - Never writes a record when the flow fails
//! - Still returns the credential when it cannot be saved

use async_trait::async_trait;
use pocket_core::{
    AuthError, AuthFlow, Authorization, AuthorizationApi, AuthorizationPrompt, CallbackError,
    ConsumerKey, CredentialSource, CredentialStore, PocketAuthClient, PocketConfig, RemoteError,
    RequestToken,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use url::Url;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, method, path},
};

/// Shared, ordered log of what the flow did.
#[derive(Clone, Default)]
struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Scripted stand-in for the Pocket service.
struct ScriptedApi {
    events: Events,
    fail_exchange: bool,
}

impl ScriptedApi {
    fn new(events: &Events) -> Self {
        Self {
            events: events.clone(),
            fail_exchange: false,
        }
    }
}

#[async_trait]
impl AuthorizationApi for ScriptedApi {
    async fn obtain_request_token(
        &self,
        consumer_key: &ConsumerKey,
        redirect_uri: &str,
    ) -> Result<RequestToken, RemoteError> {
        assert_eq!(consumer_key.expose(), "abc123");
        self.events.push(format!("request {}", redirect_uri));
        Ok(RequestToken::new("req-1", redirect_uri))
    }

    fn authorization_url(
        &self,
        request_token: &RequestToken,
        redirect_uri: &str,
    ) -> Result<Url, RemoteError> {
        self.events.push("url");
        let mut url = Url::parse("https://getpocket.com/auth/authorize")?;
        url.query_pairs_mut()
            .append_pair("request_token", request_token.code.expose())
            .append_pair("redirect_uri", redirect_uri);
        Ok(url)
    }

    async fn obtain_access_token(
        &self,
        _consumer_key: &ConsumerKey,
        request_token: &RequestToken,
    ) -> Result<Authorization, RemoteError> {
        self.events.push(format!("exchange {}", request_token.code.expose()));
        if self.fail_exchange {
            return Err(RemoteError::Rejected {
                status: 403,
                code: Some(158),
                message: "User rejected code.".into(),
            });
        }
        Ok(Authorization::new("tok-xyz", "alice"))
    }
}

/// Plays the user's browser: follows the redirect target in the URL.
struct BrowserPrompt {
    events: Events,
    hit_favicon: bool,
}

impl BrowserPrompt {
    fn new(events: &Events) -> Self {
        Self {
            events: events.clone(),
            hit_favicon: true,
        }
    }
}

impl AuthorizationPrompt for BrowserPrompt {
    fn present(&self, url: &Url) {
        self.events.push("present");
        let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
        let redirect = query["redirect_uri"].clone();
        let hit_favicon = self.hit_favicon;

        tokio::spawn(async move {
            if hit_favicon {
                let favicon = format!("{}favicon.ico", redirect);
                let response = reqwest::get(&favicon).await.unwrap();
                assert_eq!(response.status(), 404);
            }
            let response = reqwest::get(&redirect).await.unwrap();
            assert_eq!(response.status(), 200);
            assert_eq!(response.text().await.unwrap(), "Authorized.\n");
        });
    }
}

/// A prompt whose user never finishes.
struct IdlePrompt;

impl AuthorizationPrompt for IdlePrompt {
    fn present(&self, _url: &Url) {}
}

fn test_config() -> (PocketConfig, TempDir) {
    let temp = TempDir::new().unwrap();
    let config = PocketConfig::load(Some(temp.path())).unwrap();
    (config, temp)
}

#[tokio::test]
async fn test_cached_authorization_short_circuits() {
    let (config, _temp) = test_config();
    let store = CredentialStore::new(&config);
    store
        .save_authorization(&Authorization::new("cached-token", "bob"))
        .unwrap();

    let events = Events::default();
    let flow = AuthFlow::new(&config, store, ScriptedApi::new(&events))
        .with_prompt(BrowserPrompt::new(&events));

    let outcome = flow.acquire(&ConsumerKey::new("abc123")).await.unwrap();

    assert_eq!(outcome.source, CredentialSource::Cache);
    assert_eq!(outcome.authorization, Authorization::new("cached-token", "bob"));
    assert!(outcome.persist_warning.is_none());
    assert!(events.snapshot().is_empty(), "no remote calls expected");
}

#[tokio::test]
async fn test_cold_start_runs_full_flow_once() {
    let (config, _temp) = test_config();
    std::fs::write(config.consumer_key_path(), "abc123\n").unwrap();

    let store = CredentialStore::new(&config);
    let consumer_key = store.load_consumer_key().unwrap();

    let events = Events::default();
    let flow = AuthFlow::new(&config, store, ScriptedApi::new(&events))
        .with_prompt(BrowserPrompt::new(&events));

    let outcome = flow.acquire(&consumer_key).await.unwrap();

    assert_eq!(outcome.source, CredentialSource::Authorized);
    assert_eq!(outcome.authorization, Authorization::new("tok-xyz", "alice"));
    assert!(outcome.persist_warning.is_none());

    let events = events.snapshot();
    assert_eq!(events.len(), 4, "{:?}", events);
    assert!(events[0].starts_with("request http://127.0.0.1:"));
    assert_eq!(events[1..], ["url", "present", "exchange req-1"]);

    // Round trip through the store
    let reloaded = flow.store().load_authorization().unwrap();
    assert_eq!(reloaded, outcome.authorization);

    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(config.auth_path()).unwrap()).unwrap();
    assert_eq!(
        on_disk,
        serde_json::json!({"access_token": "tok-xyz", "username": "alice"})
    );
}

#[tokio::test]
async fn test_malformed_cache_triggers_authorization() {
    let (config, _temp) = test_config();
    std::fs::write(config.auth_path(), "not json").unwrap();

    let events = Events::default();
    let flow = AuthFlow::new(&config, CredentialStore::new(&config), ScriptedApi::new(&events))
        .with_prompt(BrowserPrompt::new(&events));

    let outcome = flow.acquire(&ConsumerKey::new("abc123")).await.unwrap();

    assert_eq!(outcome.source, CredentialSource::Authorized);
    assert_eq!(
        flow.store().load_authorization().unwrap(),
        Authorization::new("tok-xyz", "alice")
    );
}

#[tokio::test]
async fn test_failed_exchange_writes_nothing() {
    let (config, _temp) = test_config();
    std::fs::write(config.auth_path(), "not json").unwrap();

    let events = Events::default();
    let mut api = ScriptedApi::new(&events);
    api.fail_exchange = true;
    let flow = AuthFlow::new(&config, CredentialStore::new(&config), api)
        .with_prompt(BrowserPrompt::new(&events));

    let result = flow.acquire(&ConsumerKey::new("abc123")).await;

    assert!(matches!(
        result,
        Err(AuthError::Remote(RemoteError::Rejected { .. }))
    ));
    assert_eq!(std::fs::read_to_string(config.auth_path()).unwrap(), "not json");
}

#[tokio::test]
async fn test_failed_exchange_leaves_no_file() {
    let (config, _temp) = test_config();

    let events = Events::default();
    let mut api = ScriptedApi::new(&events);
    api.fail_exchange = true;
    let flow = AuthFlow::new(&config, CredentialStore::new(&config), api)
        .with_prompt(BrowserPrompt::new(&events));

    assert!(flow.acquire(&ConsumerKey::new("abc123")).await.is_err());
    assert!(!config.auth_path().exists());
}

#[tokio::test]
async fn test_no_exchange_without_callback() {
    let (mut config, _temp) = test_config();
    config.callback_timeout_secs = Some(1);

    let events = Events::default();
    let flow = AuthFlow::new(&config, CredentialStore::new(&config), ScriptedApi::new(&events))
        .with_prompt(IdlePrompt);

    let result = flow.acquire(&ConsumerKey::new("abc123")).await;

    assert!(matches!(
        result,
        Err(AuthError::Callback(CallbackError::TimedOut(_)))
    ));
    let events = events.snapshot();
    assert_eq!(events.len(), 2, "{:?}", events);
    assert_eq!(events[1], "url");
    assert!(!config.auth_path().exists());
}

#[tokio::test]
async fn test_save_failure_is_a_warning() {
    let (mut config, temp) = test_config();
    // A directory where the record should be: unreadable and unwritable as a file
    let blocked = temp.path().join("blocked");
    std::fs::create_dir(&blocked).unwrap();
    config.auth_file = blocked.clone();

    let events = Events::default();
    let flow = AuthFlow::new(&config, CredentialStore::new(&config), ScriptedApi::new(&events))
        .with_prompt(BrowserPrompt::new(&events));

    let outcome = flow.acquire(&ConsumerKey::new("abc123")).await.unwrap();

    assert_eq!(outcome.source, CredentialSource::Authorized);
    assert_eq!(outcome.authorization, Authorization::new("tok-xyz", "alice"));
    assert!(outcome.persist_warning.is_some());
    assert!(blocked.is_dir());
    assert!(!temp.path().join("blocked.tmp").exists());
}

#[tokio::test]
async fn test_end_to_end_against_http_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/oauth/request"))
        .and(body_string_contains("consumer_key=abc123"))
        .and(body_string_contains("redirect_uri=http%3A%2F%2F127.0.0.1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("code=req-1"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/oauth/authorize"))
        .and(body_string_contains("code=req-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("access_token=tok-xyz&username=alice"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (mut config, _temp) = test_config();
    config.api_base_url = server.uri();

    let events = Events::default();
    let api = PocketAuthClient::new(&config.api_base_url).unwrap();
    let flow = AuthFlow::new(&config, CredentialStore::new(&config), api)
        .with_prompt(BrowserPrompt::new(&events));

    let outcome = flow.acquire(&ConsumerKey::new("abc123")).await.unwrap();
    assert_eq!(outcome.authorization, Authorization::new("tok-xyz", "alice"));

    // Second run uses the cache; the mocks' expect(1) guards against a repeat.
    let flow = AuthFlow::new(
        &config,
        CredentialStore::new(&config),
        PocketAuthClient::new(&config.api_base_url).unwrap(),
    )
    .with_prompt(IdlePrompt);
    let outcome = flow.acquire(&ConsumerKey::new("abc123")).await.unwrap();
    assert_eq!(outcome.source, CredentialSource::Cache);
    assert_eq!(outcome.authorization.username, "alice");
}
