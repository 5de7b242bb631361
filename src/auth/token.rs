use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Current wall-clock time as unix seconds.
pub fn now_epoch() -> i64 {
    Utc::now().timestamp()
}

/// OAuth credential pair issued by the identity provider.
///
/// Always replaced as a whole after a refresh or a device-code flow.
///
/// # Example
/// ```
/// use hytale_auth::auth::OAuthTokens;
///
/// let tokens = OAuthTokens::new("access", "refresh", 1_700_000_000);
/// assert_eq!(tokens.refresh_token, "refresh");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: i64,
}

impl OAuthTokens {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// Seconds left before expiry, negative once expired.
    pub fn remaining_secs(&self) -> i64 {
        self.expires_at - now_epoch()
    }
}

/// Profile-scoped game session credentials handed to the server process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub session_token: String,
    pub identity_token: String,
    /// Unix seconds.
    pub expires_epoch: i64,
}

impl SessionTokens {
    pub fn new(
        session_token: impl Into<String>,
        identity_token: impl Into<String>,
        expires_epoch: i64,
    ) -> Self {
        Self {
            session_token: session_token.into(),
            identity_token: identity_token.into(),
            expires_epoch,
        }
    }

    pub fn remaining_secs(&self) -> i64 {
        self.expires_epoch - now_epoch()
    }
}

/// One player identity attached to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub uuid: String,
    pub username: String,
}

impl Profile {
    pub fn new(uuid: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            username: username.into(),
        }
    }
}

/// Profile listing as returned by the account service, cached verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileList {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl ProfileList {
    pub fn new(profiles: Vec<Profile>) -> Self {
        Self {
            owner: None,
            profiles,
        }
    }
}

/// How a [`SelectedProfile`] came to be chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SelectionSource {
    /// First profile picked without asking.
    Auto,
    /// Chosen explicitly by an operator.
    Operator,
}

/// The profile the server plays as, plus selection metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedProfile {
    pub uuid: String,
    pub username: String,
    pub source: SelectionSource,
    pub selected_at: DateTime<Utc>,
}

impl SelectedProfile {
    pub fn from_profile(profile: &Profile, source: SelectionSource) -> Self {
        Self {
            uuid: profile.uuid.clone(),
            username: profile.username.clone(),
            source,
            selected_at: Utc::now(),
        }
    }
}
