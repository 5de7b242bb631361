use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use super::{bearer, rate_limited};
use crate::auth::device_code::{DeviceCodePoll, DeviceCodeSession};
use crate::auth::error::AuthError;
use crate::auth::oauth::{expires_within, OAuthClient, DEFAULT_REFRESH_SKEW_SECS};
use crate::auth::store::{TokenStore, TokenStoreExt};
use crate::auth::token::{now_epoch, OAuthTokens, Profile, ProfileList};
use crate::util::with_timeout;

pub const DEFAULT_CLIENT_ID: &str = "hytale-server";
pub const DEFAULT_SCOPE: &str = "openid offline auth:server";
pub const DEFAULT_OAUTH_BASE_URL: &str = "https://oauth.accounts.hytale.com";
pub const DEFAULT_ACCOUNT_DATA_URL: &str = "https://account-data.hytale.com";

const DEVICE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SLOW_DOWN_STEP_SECS: u64 = 5;

/// Hytale identity-provider client speaking the OAuth2 device-code grant.
///
/// Successful token responses are persisted through the token store before
/// they are returned; fetched profile lists are cached the same way.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use hytale_auth::auth::{FileTokenStore, TokenStoreConfig};
/// use hytale_auth::auth::providers::HttpOAuthClient;
///
/// let store = FileTokenStore::new(TokenStoreConfig::new("/tmp/tokens".into()));
/// let client = HttpOAuthClient::new(Arc::new(store));
/// ```
pub struct HttpOAuthClient {
    client: reqwest::Client,
    client_id: String,
    scope: String,
    device_auth_url: String,
    token_url: String,
    profiles_url: String,
    refresh_skew_secs: i64,
    token_store: Arc<dyn TokenStore>,
}

impl HttpOAuthClient {
    pub fn new(token_store: Arc<dyn TokenStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            device_auth_url: format!("{DEFAULT_OAUTH_BASE_URL}/oauth2/device/auth"),
            token_url: format!("{DEFAULT_OAUTH_BASE_URL}/oauth2/token"),
            profiles_url: format!("{DEFAULT_ACCOUNT_DATA_URL}/my-account/get-profiles"),
            refresh_skew_secs: DEFAULT_REFRESH_SKEW_SECS,
            token_store,
        }
    }

    /// Point the device and token endpoints at another OAuth server root.
    pub fn with_oauth_base_url(self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.with_device_auth_url(format!("{base}/oauth2/device/auth"))
            .with_token_url(format!("{base}/oauth2/token"))
    }

    /// Point the profile endpoint at another account-data server root.
    pub fn with_account_data_url(self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.with_profiles_url(format!("{base}/my-account/get-profiles"))
    }

    pub fn with_device_auth_url(mut self, url: impl Into<String>) -> Self {
        self.device_auth_url = url.into();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_profiles_url(mut self, url: impl Into<String>) -> Self {
        self.profiles_url = url.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_refresh_skew_secs(mut self, secs: i64) -> Self {
        self.refresh_skew_secs = secs;
        self
    }

    /// Issue a single token request for a pending device code.
    pub async fn poll_device_code(
        &self,
        session: &DeviceCodeSession,
    ) -> Result<DeviceCodePoll, AuthError> {
        if Utc::now() >= session.expires_at {
            return Ok(DeviceCodePoll::Expired);
        }
        let resp = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", DEVICE_GRANT),
                ("device_code", session.device_code.as_str()),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await?;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited(&resp));
        }
        let status = resp.status();
        let payload: TokenResponse = resp.json().await.map_err(|_| {
            AuthError::InvalidResponse(format!("Device token request failed with status {status}"))
        })?;
        if payload.access_token.is_some() {
            let tokens = payload.into_tokens(None)?;
            self.token_store.save_oauth_tokens(&tokens)?;
            return Ok(DeviceCodePoll::Authorized { tokens });
        }
        match payload.error.as_deref() {
            Some("authorization_pending") => Ok(DeviceCodePoll::Pending {
                interval_secs: session.interval_secs,
            }),
            Some("slow_down") => Ok(DeviceCodePoll::SlowDown {
                interval_secs: session.interval_secs.saturating_add(SLOW_DOWN_STEP_SECS),
            }),
            Some("expired_token") => Ok(DeviceCodePoll::Expired),
            Some("access_denied") => Ok(DeviceCodePoll::AccessDenied),
            Some(other) => Err(AuthError::InvalidResponse(format!(
                "Device code error: {other}"
            ))),
            None => Err(AuthError::InvalidResponse(
                "Device token response missing token and error".to_string(),
            )),
        }
    }
}

#[async_trait]
impl OAuthClient for HttpOAuthClient {
    async fn request_device_code(&self) -> Result<DeviceCodeSession, AuthError> {
        let resp = self
            .client
            .post(&self.device_auth_url)
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "Device code request failed with status {}",
                resp.status()
            )));
        }
        let payload: DeviceCodeResponse = resp.json().await?;
        let expires_at = expiry_from_now(payload.expires_in)?;
        let session = DeviceCodeSession {
            verification_url: payload.verification_uri,
            verification_url_complete: payload.verification_uri_complete,
            user_code: payload.user_code,
            device_code: payload.device_code,
            interval_secs: payload.interval.unwrap_or(5),
            expires_at,
        };
        info!(
            url = %session
                .verification_url_complete
                .as_deref()
                .unwrap_or(&session.verification_url),
            code = %session.user_code,
            "Authorize this server: visit the URL and enter the code"
        );
        Ok(session)
    }

    async fn poll_for_token(&self, session: &DeviceCodeSession) -> Result<OAuthTokens, AuthError> {
        let remaining = (session.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        with_timeout(remaining, async {
            let mut interval_secs = session.interval_secs.max(1);
            loop {
                tokio::time::sleep(Duration::from_secs(interval_secs)).await;
                match self.poll_device_code(session).await? {
                    DeviceCodePoll::Authorized { tokens } => {
                        info!("Device authorization complete");
                        return Ok(tokens);
                    }
                    DeviceCodePoll::Pending { interval_secs: next } => {
                        interval_secs = next.max(1);
                    }
                    DeviceCodePoll::SlowDown { interval_secs: next } => {
                        debug!(interval_secs = next, "Identity provider asked to slow down");
                        interval_secs = next;
                    }
                    DeviceCodePoll::AccessDenied => return Err(AuthError::AccessDenied),
                    DeviceCodePoll::Expired => return Err(AuthError::DeviceCodeExpired),
                }
            }
        })
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<OAuthTokens, AuthError> {
        let resp = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited(&resp));
        }
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::ExpiredOrInvalidGrant);
        }
        if !status.is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "Token refresh failed with status {status}"
            )));
        }
        let payload: TokenResponse = resp.json().await?;
        let tokens = payload.into_tokens(Some(refresh_token))?;
        self.token_store.save_oauth_tokens(&tokens)?;
        info!(expires_in = tokens.remaining_secs(), "OAuth tokens refreshed");
        Ok(tokens)
    }

    fn needs_refresh(&self, expires_at: i64) -> bool {
        expires_within(expires_at, self.refresh_skew_secs)
    }

    async fn get_profiles(&self, access_token: &str) -> Result<Vec<Profile>, AuthError> {
        let resp = self
            .client
            .get(&self.profiles_url)
            .header("Accept", "application/json")
            .header("Authorization", bearer(access_token))
            .send()
            .await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(AuthError::ExpiredOrInvalidGrant);
        }
        if !resp.status().is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "Profile request failed with status {}",
                resp.status()
            )));
        }
        let list: ProfileList = resp.json().await?;
        self.token_store.save_profiles(&list)?;
        debug!(count = list.profiles.len(), "Fetched game profiles");
        Ok(list.profiles)
    }
}

/// Absolute expiry for a device code valid for `expires_in` seconds.
fn expiry_from_now(expires_in: u64) -> Result<DateTime<Utc>, AuthError> {
    i64::try_from(expires_in)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| {
            AuthError::InvalidResponse(format!("Device code expires_in out of range: {expires_in}"))
        })
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    verification_uri_complete: Option<String>,
    expires_in: u64,
    interval: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
}

impl TokenResponse {
    fn into_tokens(self, previous_refresh: Option<&str>) -> Result<OAuthTokens, AuthError> {
        let access_token = self.access_token.ok_or_else(|| {
            AuthError::InvalidResponse("Token response missing access_token".to_string())
        })?;
        let refresh_token = self
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string))
            .ok_or_else(|| {
                AuthError::InvalidResponse("Token response missing refresh_token".to_string())
            })?;
        let expires_in = self.expires_in.unwrap_or(3600);
        let expires_at = (expires_in >= 0)
            .then(|| now_epoch().checked_add(expires_in))
            .flatten()
            .ok_or_else(|| {
                AuthError::InvalidResponse(format!("Token expires_in out of range: {expires_in}"))
            })?;
        Ok(OAuthTokens {
            access_token,
            refresh_token,
            expires_at,
        })
    }
}
