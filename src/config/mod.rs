//! Runtime configuration (layered: code > env > defaults).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::oauth::DEFAULT_REFRESH_SKEW_SECS;
use crate::auth::providers::hytale_oauth::{
    DEFAULT_ACCOUNT_DATA_URL, DEFAULT_CLIENT_ID, DEFAULT_OAUTH_BASE_URL, DEFAULT_SCOPE,
};
use crate::auth::providers::hytale_session::DEFAULT_SESSIONS_URL;
use crate::auth::providers::{HttpOAuthClient, HttpSessionManager};
use crate::auth::refresh::DEFAULT_REFRESH_INTERVAL;
use crate::auth::{AuthService, DefaultProfileManager, FileTokenStore, TokenStore, TokenStoreConfig};
use crate::error::{HytaleAuthError, Result};

const DEFAULT_PROFILE_WAIT: Duration = Duration::from_secs(5);

/// Settings for the credential lifecycle manager.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token_dir: PathBuf,
    /// Pick the first profile without waiting for an operator.
    pub auto_select_profile: bool,
    /// Run the background refresh loop once the server is up.
    pub auto_refresh_tokens: bool,
    pub refresh_interval: Duration,
    /// How often to look for an operator's profile selection.
    pub profile_wait_interval: Duration,
    pub oauth_base_url: String,
    pub account_data_url: String,
    pub sessions_url: String,
    pub client_id: String,
    pub scope: String,
    pub oauth_refresh_skew_secs: i64,
    pub session_refresh_skew_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    pub fn new() -> Self {
        Self {
            token_dir: default_token_dir(),
            auto_select_profile: true,
            auto_refresh_tokens: true,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            profile_wait_interval: DEFAULT_PROFILE_WAIT,
            oauth_base_url: DEFAULT_OAUTH_BASE_URL.to_string(),
            account_data_url: DEFAULT_ACCOUNT_DATA_URL.to_string(),
            sessions_url: DEFAULT_SESSIONS_URL.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            oauth_refresh_skew_secs: DEFAULT_REFRESH_SKEW_SECS,
            session_refresh_skew_secs: DEFAULT_REFRESH_SKEW_SECS,
        }
    }

    /// Load from environment variables, reading `.env` first if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unset values keep defaults.
    ///
    /// Boolean flags are on only for `true` (any case); any other set value
    /// turns them off.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();
        if let Some(dir) = lookup("HYTALE_TOKEN_DIR").filter(|v| !v.trim().is_empty()) {
            config.token_dir = PathBuf::from(dir);
        }
        config.auto_select_profile =
            parse_bool(lookup("AUTOSELECT_GAME_PROFILE"), config.auto_select_profile);
        config.auto_refresh_tokens =
            parse_bool(lookup("AUTO_REFRESH_TOKENS"), config.auto_refresh_tokens);
        if let Some(url) = lookup("HYTALE_OAUTH_BASE_URL") {
            config.oauth_base_url = url;
        }
        if let Some(url) = lookup("HYTALE_ACCOUNT_DATA_URL") {
            config.account_data_url = url;
        }
        if let Some(url) = lookup("HYTALE_SESSIONS_URL") {
            config.sessions_url = url;
        }
        config
    }

    pub fn with_token_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.token_dir = dir.into();
        self
    }

    pub fn with_auto_select_profile(mut self, enabled: bool) -> Self {
        self.auto_select_profile = enabled;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_oauth_base_url(mut self, url: impl Into<String>) -> Self {
        self.oauth_base_url = url.into();
        self
    }

    pub fn with_account_data_url(mut self, url: impl Into<String>) -> Self {
        self.account_data_url = url.into();
        self
    }

    pub fn with_sessions_url(mut self, url: impl Into<String>) -> Self {
        self.sessions_url = url.into();
        self
    }

    /// Reject settings the lifecycle cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("oauth_base_url", &self.oauth_base_url),
            ("account_data_url", &self.account_data_url),
            ("sessions_url", &self.sessions_url),
        ] {
            reqwest::Url::parse(url)
                .map_err(|e| HytaleAuthError::Configuration(format!("{name} {url:?}: {e}")))?;
        }
        if self.refresh_interval.is_zero() {
            return Err(HytaleAuthError::Configuration(
                "refresh_interval must be non-zero".to_string(),
            ));
        }
        if self.profile_wait_interval.is_zero() {
            return Err(HytaleAuthError::Configuration(
                "profile_wait_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn token_store(&self) -> Arc<FileTokenStore> {
        Arc::new(FileTokenStore::new(TokenStoreConfig::new(
            self.token_dir.clone(),
        )))
    }

    /// Wire the file store and the HTTP collaborators into an [`AuthService`].
    pub fn build_service(&self) -> Result<AuthService> {
        self.validate()?;
        let store: Arc<dyn TokenStore> = self.token_store();
        let oauth = HttpOAuthClient::new(Arc::clone(&store))
            .with_oauth_base_url(&self.oauth_base_url)
            .with_account_data_url(&self.account_data_url)
            .with_client_id(self.client_id.clone())
            .with_scope(self.scope.clone())
            .with_refresh_skew_secs(self.oauth_refresh_skew_secs);
        let sessions = HttpSessionManager::new(Arc::clone(&store))
            .with_base_url(self.sessions_url.clone())
            .with_expiry_skew_secs(self.session_refresh_skew_secs);
        let profiles = DefaultProfileManager::new(Arc::clone(&store), self.auto_select_profile);
        Ok(AuthService::new(
            store,
            Arc::new(oauth),
            Arc::new(profiles),
            Arc::new(sessions),
        )
        .with_refresh_interval(self.refresh_interval))
    }
}

fn parse_bool(value: Option<String>, fallback: bool) -> bool {
    match value {
        Some(v) => v.trim().eq_ignore_ascii_case("true"),
        None => fallback,
    }
}

fn default_token_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".hytale").join("tokens"))
        .unwrap_or_else(|| PathBuf::from(".hytale/tokens"))
}
