use chrono::{DateTime, Utc};

use super::token::OAuthTokens;

/// Device-code session details handed back by the identity provider.
///
/// # Example
/// ```no_run
/// use hytale_auth::auth::DeviceCodeSession;
/// use chrono::{Duration, Utc};
///
/// let session = DeviceCodeSession {
///     verification_url: "https://accounts.hytale.com/device".to_string(),
///     verification_url_complete: None,
///     user_code: "ABCD-EFGH".to_string(),
///     device_code: "device-code".to_string(),
///     interval_secs: 5,
///     expires_at: Utc::now() + Duration::minutes(15),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct DeviceCodeSession {
    pub verification_url: String,
    /// Verification URL with the user code already embedded, when offered.
    pub verification_url_complete: Option<String>,
    pub user_code: String,
    pub device_code: String,
    pub interval_secs: u64,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a single token poll for a device-code session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCodePoll {
    Pending { interval_secs: u64 },
    SlowDown { interval_secs: u64 },
    Authorized { tokens: OAuthTokens },
    AccessDenied,
    Expired,
}
