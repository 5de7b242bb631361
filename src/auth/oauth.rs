//! OAuth collaborator interface.

use async_trait::async_trait;

use super::device_code::DeviceCodeSession;
use super::error::AuthError;
use super::token::{now_epoch, OAuthTokens, Profile};

/// Default margin before expiry at which a token is treated as stale.
pub const DEFAULT_REFRESH_SKEW_SECS: i64 = 300;

/// Stateless OAuth wire client against the identity provider.
#[async_trait]
pub trait OAuthClient: Send + Sync {
    /// Start a device-code flow.
    async fn request_device_code(&self) -> Result<DeviceCodeSession, AuthError>;

    /// Poll until the user authorizes the device code.
    ///
    /// Cadence and timeout are owned by the implementation.
    async fn poll_for_token(&self, session: &DeviceCodeSession) -> Result<OAuthTokens, AuthError>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh_token(&self, refresh_token: &str) -> Result<OAuthTokens, AuthError>;

    /// Whether a token expiring at `expires_at` (unix seconds) should be refreshed now.
    fn needs_refresh(&self, expires_at: i64) -> bool;

    /// Profiles owned by the account behind `access_token`.
    async fn get_profiles(&self, access_token: &str) -> Result<Vec<Profile>, AuthError>;
}

/// True when fewer than `skew_secs` remain before `expires_at`.
pub fn expires_within(expires_at: i64, skew_secs: i64) -> bool {
    expires_at - now_epoch() < skew_secs
}
