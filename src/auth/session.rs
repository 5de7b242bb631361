//! Game-session collaborator interface.

use async_trait::async_trait;

use super::error::AuthError;
use super::token::SessionTokens;

/// Stateless wire client for the game-session layer.
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Create a session for `profile_uuid` backed by `access_token`.
    async fn create(
        &self,
        profile_uuid: &str,
        access_token: &str,
    ) -> Result<SessionTokens, AuthError>;

    /// Refresh an existing session.
    ///
    /// `Ok(None)` means the session cannot be extended and a new one must be
    /// created instead.
    async fn refresh(&self, session_token: &str) -> Result<Option<SessionTokens>, AuthError>;

    /// End a session server-side.
    async fn terminate(&self, session_token: &str) -> Result<(), AuthError>;

    /// Whether a session expiring at `expires_epoch` (unix seconds) is due for renewal.
    fn is_expiring(&self, expires_epoch: i64) -> bool;
}
