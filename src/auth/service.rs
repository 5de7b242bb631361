//! Credential and game-session lifecycle orchestration.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use super::error::AuthError;
use super::oauth::OAuthClient;
use super::profile::ProfileManager;
use super::refresh::{BackgroundRefresh, RefreshReport, TickOutcome, DEFAULT_REFRESH_INTERVAL};
use super::session::SessionManager;
use super::store::{TokenStore, TokenStoreExt};
use super::token::{OAuthTokens, SessionTokens};

/// Keeps OAuth and game-session credentials valid for a long-running server.
///
/// Host flow: [`ensure_downloader_auth`](Self::ensure_downloader_auth) once,
/// [`ensure_valid_session(true)`](Self::ensure_valid_session) once, then
/// [`start_background_refresh`](Self::start_background_refresh); on shutdown
/// [`stop_background_refresh`](Self::stop_background_refresh) and
/// [`terminate_session`](Self::terminate_session).
///
/// Session creation from the foreground and from the background loop is
/// serialized, so two creations never overlap.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use hytale_auth::auth::{
///     AuthService, DefaultProfileManager, FileTokenStore, TokenStore, TokenStoreConfig,
/// };
/// use hytale_auth::auth::providers::{HttpOAuthClient, HttpSessionManager};
///
/// # async fn run() -> Result<(), hytale_auth::auth::AuthError> {
/// let store: Arc<dyn TokenStore> =
///     Arc::new(FileTokenStore::new(TokenStoreConfig::new("/server/.hytale/tokens".into())));
/// let svc = AuthService::new(
///     store.clone(),
///     Arc::new(HttpOAuthClient::new(store.clone())),
///     Arc::new(DefaultProfileManager::new(store.clone(), true)),
///     Arc::new(HttpSessionManager::new(store)),
/// );
/// svc.ensure_downloader_auth().await?;
/// let session = svc.ensure_valid_session(true).await?;
/// svc.start_background_refresh();
/// # Ok(())
/// # }
/// ```
pub struct AuthService {
    core: Arc<Lifecycle>,
    refresh_interval: Duration,
    background: Mutex<Option<BackgroundRefresh>>,
}

struct Lifecycle {
    store: Arc<dyn TokenStore>,
    oauth: Arc<dyn OAuthClient>,
    profiles: Arc<dyn ProfileManager>,
    sessions: Arc<dyn SessionManager>,
    creation_lock: AsyncMutex<()>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn TokenStore>,
        oauth: Arc<dyn OAuthClient>,
        profiles: Arc<dyn ProfileManager>,
        sessions: Arc<dyn SessionManager>,
    ) -> Self {
        Self {
            core: Arc::new(Lifecycle {
                store,
                oauth,
                profiles,
                sessions,
                creation_lock: AsyncMutex::new(()),
            }),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            background: Mutex::new(None),
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Access the underlying token store.
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.core.store
    }

    /// Valid OAuth tokens for a non-interactive actor.
    ///
    /// Stored tokens are always refreshed. Any refresh failure falls back to a
    /// device-code flow, which suspends until the user authorizes; only that
    /// flow's failure is returned as an error.
    pub async fn ensure_downloader_auth(&self) -> Result<OAuthTokens, AuthError> {
        self.core.ensure_downloader_auth().await
    }

    /// A usable game session, or `None` when none can be made yet.
    ///
    /// With `force_new` any cached session is ignored and a new one is created.
    /// Otherwise a cached session is reused while fresh and refreshed once
    /// expiring, falling back to creation when refresh yields nothing.
    pub async fn ensure_valid_session(
        &self,
        force_new: bool,
    ) -> Result<Option<SessionTokens>, AuthError> {
        self.core.ensure_valid_session(force_new).await
    }

    /// Create a session, waiting for an operator to select a profile if needed.
    ///
    /// Checks the store for a selected profile every `poll_interval` and
    /// retries once one appears. Fails with [`AuthError::NotLoggedIn`] when no
    /// OAuth tokens exist, since no selection could help then.
    pub async fn wait_for_session(
        &self,
        poll_interval: Duration,
    ) -> Result<SessionTokens, AuthError> {
        loop {
            if let Some(session) = self.ensure_valid_session(true).await? {
                return Ok(session);
            }
            if self.core.store.load_oauth_tokens()?.is_none() {
                return Err(AuthError::NotLoggedIn);
            }
            warn!("Waiting for profile selection...");
            loop {
                tokio::time::sleep(poll_interval).await;
                if let Some(selected) = self.core.store.load_selected_profile()? {
                    info!(username = %selected.username, "Profile selected");
                    break;
                }
            }
        }
    }

    /// Start the recurring refresh task. No-op while it is already running.
    pub fn start_background_refresh(&self) {
        let mut slot = self
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            debug!("Token refresh monitor already running");
            return;
        }
        let core = Arc::clone(&self.core);
        *slot = Some(BackgroundRefresh::spawn(self.refresh_interval, move || {
            let core = Arc::clone(&core);
            async move { core.refresh_tick().await }
        }));
        info!(
            interval_secs = self.refresh_interval.as_secs(),
            "Token refresh monitor started"
        );
    }

    /// Cancel future refresh ticks. Safe to call when not running.
    pub fn stop_background_refresh(&self) {
        let handle = self
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.stop();
            info!("Token refresh monitor stopped");
        }
    }

    pub fn is_background_refresh_running(&self) -> bool {
        self.background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Run one refresh tick immediately: the session check, then the OAuth check.
    pub async fn refresh_tick(&self) -> RefreshReport {
        self.core.refresh_tick().await
    }

    /// Best-effort termination of the cached session. Never fails.
    pub async fn terminate_session(&self) {
        let session = match self.core.store.load_session_tokens() {
            Ok(Some(session)) => session,
            Ok(None) => return,
            Err(error) => {
                debug!(error = %error, "Could not read session tokens for termination");
                return;
            }
        };
        if let Err(error) = self.core.sessions.terminate(&session.session_token).await {
            debug!(error = %error, "Ignoring session termination failure");
        }
    }

    /// Remove every stored credential artifact.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.core.store.clear_all()?;
        info!("Cleared all stored tokens");
        Ok(())
    }

    /// Read-only snapshot of what is stored. Unreadable artifacts show as absent.
    pub fn status(&self) -> TokenStatus {
        let store = &self.core.store;
        TokenStatus {
            oauth_expires_in: store
                .load_oauth_tokens()
                .ok()
                .flatten()
                .map(|t| t.remaining_secs()),
            session_expires_in: store
                .load_session_tokens()
                .ok()
                .flatten()
                .map(|s| s.remaining_secs()),
            profile: store
                .load_profiles()
                .ok()
                .flatten()
                .and_then(|list| list.profiles.into_iter().next())
                .map(|p| p.username),
        }
    }

    pub fn write_status(&self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "{}", self.status())
    }

    /// Print [`status`](Self::status) to stdout.
    pub fn print_status(&self) {
        let _ = self.write_status(&mut io::stdout().lock());
    }
}

impl Lifecycle {
    async fn ensure_downloader_auth(&self) -> Result<OAuthTokens, AuthError> {
        let existing = self.store.load_oauth_tokens().unwrap_or_else(|error| {
            warn!(error = %error, "Could not read stored OAuth tokens");
            None
        });
        if let Some(existing) = existing {
            match self.oauth.refresh_token(&existing.refresh_token).await {
                Ok(tokens) => return Ok(tokens),
                Err(error) => warn!(error = %error, "Token refresh failed, starting new auth flow"),
            }
        }

        info!("Authenticating for server download");
        let device = self.oauth.request_device_code().await?;
        self.oauth.poll_for_token(&device).await
    }

    async fn ensure_valid_session(
        &self,
        force_new: bool,
    ) -> Result<Option<SessionTokens>, AuthError> {
        if !force_new {
            let cached = self.store.load_session_tokens().unwrap_or_else(|error| {
                warn!(error = %error, "Could not read stored session tokens");
                None
            });
            if let Some(session) = cached {
                if !self.sessions.is_expiring(session.expires_epoch) {
                    debug!("Session tokens valid");
                    return Ok(Some(session));
                }
                if let Some(refreshed) = self.try_refresh_session(&session).await {
                    return Ok(Some(refreshed));
                }
                return self
                    .create_session(Some(&session))
                    .await
                    .map(Creation::into_session);
            }
        }
        self.create_session(None).await.map(Creation::into_session)
    }

    async fn try_refresh_session(&self, session: &SessionTokens) -> Option<SessionTokens> {
        match self.sessions.refresh(&session.session_token).await {
            Ok(Some(refreshed)) => Some(refreshed),
            Ok(None) => {
                info!("Session cannot be refreshed, creating a new one");
                None
            }
            Err(error) => {
                warn!(error = %error, "Session refresh failed, creating a new one");
                None
            }
        }
    }

    /// Resolve a profile against a fresh access token and create a session for it.
    ///
    /// With `stale`, creation is skipped when another caller already replaced
    /// that session with a fresh one while this one waited for the lock.
    async fn create_session(&self, stale: Option<&SessionTokens>) -> Result<Creation, AuthError> {
        let _guard = self.creation_lock.lock().await;

        if let Some(stale) = stale {
            if let Some(current) = self.store.load_session_tokens()? {
                if current.session_token != stale.session_token
                    && !self.sessions.is_expiring(current.expires_epoch)
                {
                    debug!("Session already replaced by a concurrent creation");
                    return Ok(Creation::AlreadyReplaced(current));
                }
            }
        }

        let Some(oauth) = self.store.load_oauth_tokens()? else {
            error!("No valid tokens available. Run device auth flow.");
            return Ok(Creation::Deferred);
        };
        let access_token = if self.oauth.needs_refresh(oauth.expires_at) {
            self.oauth.refresh_token(&oauth.refresh_token).await?.access_token
        } else {
            oauth.access_token
        };

        let profiles = self.oauth.get_profiles(&access_token).await?;
        let Some(profile) = self.profiles.select(&profiles).await? else {
            info!("No profile selected, session creation deferred");
            return Ok(Creation::Deferred);
        };
        if !profiles
            .iter()
            .any(|p| p.uuid.eq_ignore_ascii_case(&profile.uuid))
        {
            return Err(AuthError::InvalidSelection(format!(
                "profile {} is not on the account behind the current token",
                profile.uuid
            )));
        }

        let session = self.sessions.create(&profile.uuid, &access_token).await?;
        Ok(Creation::Created(session))
    }

    async fn refresh_tick(&self) -> RefreshReport {
        let session = self.check_session().await;
        let oauth = self.check_oauth().await;
        RefreshReport { session, oauth }
    }

    async fn check_session(&self) -> TickOutcome {
        let session = match self.store.load_session_tokens() {
            Ok(Some(session)) => session,
            Ok(None) => return TickOutcome::Skipped,
            Err(error) => return TickOutcome::Failed(error.to_string()),
        };
        if !self.sessions.is_expiring(session.expires_epoch) {
            return TickOutcome::Skipped;
        }
        if self.try_refresh_session(&session).await.is_some() {
            return TickOutcome::Refreshed;
        }
        match self.create_session(Some(&session)).await {
            Ok(Creation::Created(_)) => TickOutcome::Recreated,
            Ok(Creation::AlreadyReplaced(_)) => TickOutcome::Skipped,
            Ok(Creation::Deferred) => {
                TickOutcome::Failed("no session could be created".to_string())
            }
            Err(error) => TickOutcome::Failed(error.to_string()),
        }
    }

    async fn check_oauth(&self) -> TickOutcome {
        let tokens = match self.store.load_oauth_tokens() {
            Ok(Some(tokens)) => tokens,
            Ok(None) => return TickOutcome::Skipped,
            Err(error) => return TickOutcome::Failed(error.to_string()),
        };
        if !self.oauth.needs_refresh(tokens.expires_at) {
            return TickOutcome::Skipped;
        }
        match self.oauth.refresh_token(&tokens.refresh_token).await {
            Ok(_) => TickOutcome::Refreshed,
            Err(error) => TickOutcome::Failed(error.to_string()),
        }
    }
}

/// Result of one pass through session creation.
enum Creation {
    Created(SessionTokens),
    /// A concurrent caller already stored a fresh replacement.
    AlreadyReplaced(SessionTokens),
    /// No OAuth tokens or no selected profile yet.
    Deferred,
}

impl Creation {
    fn into_session(self) -> Option<SessionTokens> {
        match self {
            Self::Created(session) | Self::AlreadyReplaced(session) => Some(session),
            Self::Deferred => None,
        }
    }
}

/// Stored credential snapshot, as rendered by [`AuthService::print_status`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStatus {
    /// Seconds until the OAuth access token expires, if stored.
    pub oauth_expires_in: Option<i64>,
    /// Seconds until the session expires, if stored.
    pub session_expires_in: Option<i64>,
    /// Username of the first cached profile.
    pub profile: Option<String>,
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\nToken Status:")?;
        writeln!(f, "{}", "─".repeat(41))?;
        match self.oauth_expires_in {
            Some(remaining) => {
                writeln!(f, "  OAuth Access Token:  Present (expires in {remaining}s)")?;
                writeln!(f, "  OAuth Refresh Token: Present")?;
            }
            None => writeln!(f, "  OAuth Tokens:        Not found")?,
        }
        match self.session_expires_in {
            Some(remaining) => {
                writeln!(f, "  Session Token:       Present (expires in {remaining}s)")?;
                writeln!(f, "  Identity Token:      Present")?;
            }
            None => writeln!(f, "  Session Tokens:      Not found")?,
        }
        if let Some(profile) = &self.profile {
            writeln!(f, "  Profile:             {profile}")?;
        }
        writeln!(f)
    }
}
