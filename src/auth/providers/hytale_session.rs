use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{bearer, parse_expires_at, rate_limited};
use crate::auth::error::AuthError;
use crate::auth::oauth::{expires_within, DEFAULT_REFRESH_SKEW_SECS};
use crate::auth::session::SessionManager;
use crate::auth::store::{Artifact, TokenStore, TokenStoreExt};
use crate::auth::token::SessionTokens;

pub const DEFAULT_SESSIONS_URL: &str = "https://sessions.hytale.com";

/// Game-session service client.
///
/// Created and refreshed sessions are persisted before they are returned;
/// termination clears the persisted session.
pub struct HttpSessionManager {
    client: reqwest::Client,
    base_url: String,
    expiry_skew_secs: i64,
    token_store: Arc<dyn TokenStore>,
}

impl HttpSessionManager {
    pub fn new(token_store: Arc<dyn TokenStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_SESSIONS_URL.to_string(),
            expiry_skew_secs: DEFAULT_REFRESH_SKEW_SECS,
            token_store,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_expiry_skew_secs(mut self, secs: i64) -> Self {
        self.expiry_skew_secs = secs;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/game-session{path}", self.base_url)
    }
}

#[async_trait]
impl SessionManager for HttpSessionManager {
    async fn create(
        &self,
        profile_uuid: &str,
        access_token: &str,
    ) -> Result<SessionTokens, AuthError> {
        let resp = self
            .client
            .post(self.endpoint("/new"))
            .header("Accept", "application/json")
            .header("Authorization", bearer(access_token))
            .json(&json!({ "uuid": profile_uuid }))
            .send()
            .await?;
        match resp.status() {
            StatusCode::UNAUTHORIZED => return Err(AuthError::ExpiredOrInvalidGrant),
            StatusCode::TOO_MANY_REQUESTS => return Err(rate_limited(&resp)),
            status if !status.is_success() => {
                return Err(AuthError::InvalidResponse(format!(
                    "Session creation failed with status {status}"
                )));
            }
            _ => {}
        }
        let session = resp.json::<SessionResponse>().await?.into_tokens()?;
        self.token_store.save_session_tokens(&session)?;
        info!(
            uuid = %profile_uuid,
            expires_in = session.remaining_secs(),
            "Game session created"
        );
        Ok(session)
    }

    async fn refresh(&self, session_token: &str) -> Result<Option<SessionTokens>, AuthError> {
        let resp = self
            .client
            .post(self.endpoint("/refresh"))
            .header("Accept", "application/json")
            .header("Authorization", bearer(session_token))
            .send()
            .await?;
        if !resp.status().is_success() {
            warn!(status = %resp.status(), "Session refresh rejected");
            return Ok(None);
        }
        let session = resp.json::<SessionResponse>().await?.into_tokens()?;
        self.token_store.save_session_tokens(&session)?;
        info!(expires_in = session.remaining_secs(), "Game session refreshed");
        Ok(Some(session))
    }

    async fn terminate(&self, session_token: &str) -> Result<(), AuthError> {
        let result = self
            .client
            .delete(self.endpoint(""))
            .header("Authorization", bearer(session_token))
            .send()
            .await;
        self.token_store.clear(Artifact::SessionTokens)?;
        let resp = result?;
        if !resp.status().is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "Session termination failed with status {}",
                resp.status()
            )));
        }
        debug!("Game session terminated");
        Ok(())
    }

    fn is_expiring(&self, expires_epoch: i64) -> bool {
        expires_within(expires_epoch, self.expiry_skew_secs)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    session_token: String,
    identity_token: String,
    expires_at: serde_json::Value,
}

impl SessionResponse {
    fn into_tokens(self) -> Result<SessionTokens, AuthError> {
        Ok(SessionTokens {
            expires_epoch: parse_expires_at(&self.expires_at)?,
            session_token: self.session_token,
            identity_token: self.identity_token,
        })
    }
}
