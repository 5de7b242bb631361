#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hytale_auth::auth::oauth::expires_within;
use hytale_auth::auth::token::now_epoch;
use hytale_auth::auth::{
    Artifact, AuthError, AuthService, DefaultProfileManager, DeviceCodeSession, OAuthClient,
    OAuthTokens, Profile, ProfileList, SessionManager, SessionTokens, TokenStore, TokenStoreExt,
};

const SKEW_SECS: i64 = 300;

#[derive(Default)]
pub struct InMemoryTokenStore {
    artifacts: Mutex<HashMap<Artifact, serde_json::Value>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn load(&self, artifact: Artifact) -> Result<Option<serde_json::Value>, AuthError> {
        Ok(self
            .artifacts
            .lock()
            .expect("store lock poisoned")
            .get(&artifact)
            .cloned())
    }

    fn save(&self, artifact: Artifact, value: &serde_json::Value) -> Result<(), AuthError> {
        self.artifacts
            .lock()
            .expect("store lock poisoned")
            .insert(artifact, value.clone());
        Ok(())
    }

    fn clear(&self, artifact: Artifact) -> Result<(), AuthError> {
        self.artifacts
            .lock()
            .expect("store lock poisoned")
            .remove(&artifact);
        Ok(())
    }
}

/// Scripted identity provider. Successful token responses are persisted like
/// the HTTP client does.
pub struct FakeOAuthClient {
    store: Arc<InMemoryTokenStore>,
    refresh_results: Mutex<VecDeque<Result<OAuthTokens, AuthError>>>,
    device_tokens: Mutex<Option<OAuthTokens>>,
    profiles: Mutex<Vec<Profile>>,
    profile_tokens: Mutex<Vec<String>>,
    pub refresh_calls: AtomicUsize,
    pub device_code_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
}

impl FakeOAuthClient {
    pub fn new(store: Arc<InMemoryTokenStore>) -> Self {
        Self {
            store,
            refresh_results: Mutex::new(VecDeque::new()),
            device_tokens: Mutex::new(None),
            profiles: Mutex::new(Vec::new()),
            profile_tokens: Mutex::new(Vec::new()),
            refresh_calls: AtomicUsize::new(0),
            device_code_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
        }
    }

    /// Queue the next refresh outcome. An empty queue fails with an invalid grant.
    pub fn queue_refresh(&self, result: Result<OAuthTokens, AuthError>) {
        self.refresh_results.lock().unwrap().push_back(result);
    }

    pub fn set_device_tokens(&self, tokens: OAuthTokens) {
        *self.device_tokens.lock().unwrap() = Some(tokens);
    }

    pub fn set_profiles(&self, profiles: Vec<Profile>) {
        *self.profiles.lock().unwrap() = profiles;
    }

    /// Access tokens seen by `get_profiles`, in call order.
    pub fn profile_tokens(&self) -> Vec<String> {
        self.profile_tokens.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
            + self.device_code_calls.load(Ordering::SeqCst)
            + self.poll_calls.load(Ordering::SeqCst)
            + self.profile_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuthClient for FakeOAuthClient {
    async fn request_device_code(&self) -> Result<DeviceCodeSession, AuthError> {
        self.device_code_calls.fetch_add(1, Ordering::SeqCst);
        Ok(DeviceCodeSession {
            verification_url: "https://accounts.example/device".to_string(),
            verification_url_complete: None,
            user_code: "ABCD-EFGH".to_string(),
            device_code: "device-1".to_string(),
            interval_secs: 5,
            expires_at: Utc::now() + chrono::Duration::minutes(15),
        })
    }

    async fn poll_for_token(&self, _session: &DeviceCodeSession) -> Result<OAuthTokens, AuthError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let tokens = self
            .device_tokens
            .lock()
            .unwrap()
            .clone()
            .ok_or(AuthError::AccessDenied)?;
        self.store.save_oauth_tokens(&tokens)?;
        Ok(tokens)
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<OAuthTokens, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .refresh_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(AuthError::ExpiredOrInvalidGrant));
        let tokens = next?;
        self.store.save_oauth_tokens(&tokens)?;
        Ok(tokens)
    }

    fn needs_refresh(&self, expires_at: i64) -> bool {
        expires_within(expires_at, SKEW_SECS)
    }

    async fn get_profiles(&self, access_token: &str) -> Result<Vec<Profile>, AuthError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.profile_tokens
            .lock()
            .unwrap()
            .push(access_token.to_string());
        let profiles = self.profiles.lock().unwrap().clone();
        self.store.save_profiles(&ProfileList::new(profiles.clone()))?;
        Ok(profiles)
    }
}

/// Scripted session service. Created sessions are numbered S1, S2, ...
pub struct FakeSessionManager {
    store: Arc<InMemoryTokenStore>,
    refresh_results: Mutex<VecDeque<Result<Option<SessionTokens>, AuthError>>>,
    created_with: Mutex<Vec<(String, String)>>,
    fail_terminate: Mutex<bool>,
    create_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub terminate_calls: AtomicUsize,
}

impl FakeSessionManager {
    pub fn new(store: Arc<InMemoryTokenStore>) -> Self {
        Self {
            store,
            refresh_results: Mutex::new(VecDeque::new()),
            created_with: Mutex::new(Vec::new()),
            fail_terminate: Mutex::new(false),
            create_delay: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            terminate_calls: AtomicUsize::new(0),
        }
    }

    /// Queue the next refresh outcome. An empty queue yields `Ok(None)`.
    pub fn queue_refresh(&self, result: Result<Option<SessionTokens>, AuthError>) {
        self.refresh_results.lock().unwrap().push_back(result);
    }

    pub fn fail_terminate(&self) {
        *self.fail_terminate.lock().unwrap() = true;
    }

    pub fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = delay;
    }

    /// `(profile uuid, access token)` for every create call.
    pub fn created_with(&self) -> Vec<(String, String)> {
        self.created_with.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
            + self.refresh_calls.load(Ordering::SeqCst)
            + self.terminate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionManager for FakeSessionManager {
    async fn create(
        &self,
        profile_uuid: &str,
        access_token: &str,
    ) -> Result<SessionTokens, AuthError> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        self.created_with
            .lock()
            .unwrap()
            .push((profile_uuid.to_string(), access_token.to_string()));

        let delay = *self.create_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let session = SessionTokens::new(format!("S{n}"), format!("I{n}"), now_epoch() + 900);
        self.store.save_session_tokens(&session)?;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(session)
    }

    async fn refresh(&self, _session_token: &str) -> Result<Option<SessionTokens>, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .refresh_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(None));
        if let Ok(Some(session)) = &next {
            self.store.save_session_tokens(session)?;
        }
        next
    }

    async fn terminate(&self, _session_token: &str) -> Result<(), AuthError> {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
        self.store.clear(Artifact::SessionTokens)?;
        if *self.fail_terminate.lock().unwrap() {
            return Err(AuthError::Network("connection reset".to_string()));
        }
        Ok(())
    }

    fn is_expiring(&self, expires_epoch: i64) -> bool {
        expires_within(expires_epoch, SKEW_SECS)
    }
}

pub struct Harness {
    pub store: Arc<InMemoryTokenStore>,
    pub oauth: Arc<FakeOAuthClient>,
    pub sessions: Arc<FakeSessionManager>,
    pub profiles: Arc<DefaultProfileManager>,
    pub service: AuthService,
}

impl Harness {
    pub fn new(auto_select: bool) -> Self {
        let store = Arc::new(InMemoryTokenStore::new());
        let oauth = Arc::new(FakeOAuthClient::new(store.clone()));
        let sessions = Arc::new(FakeSessionManager::new(store.clone()));
        let profiles = Arc::new(DefaultProfileManager::new(store.clone(), auto_select));
        let service = AuthService::new(
            store.clone(),
            oauth.clone(),
            profiles.clone(),
            sessions.clone(),
        );
        Self {
            store,
            oauth,
            sessions,
            profiles,
            service,
        }
    }

    /// Network calls made through either wire collaborator.
    pub fn network_calls(&self) -> usize {
        self.oauth.calls() + self.sessions.calls()
    }
}

pub fn fresh_oauth(access: &str, refresh: &str) -> OAuthTokens {
    OAuthTokens::new(access, refresh, now_epoch() + 3600)
}

pub fn expiring_oauth(access: &str, refresh: &str) -> OAuthTokens {
    OAuthTokens::new(access, refresh, now_epoch() + 30)
}

pub fn fresh_session(token: &str) -> SessionTokens {
    SessionTokens::new(token, format!("id-{token}"), now_epoch() + 900)
}

pub fn expiring_session(token: &str) -> SessionTokens {
    SessionTokens::new(token, format!("id-{token}"), now_epoch() + 60)
}

pub fn steve() -> Profile {
    Profile::new("u1", "Steve")
}
