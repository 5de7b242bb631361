//! HTTP implementations of the OAuth and game-session collaborators.

pub mod hytale_oauth;
pub mod hytale_session;

pub use hytale_oauth::HttpOAuthClient;
pub use hytale_session::HttpSessionManager;

use chrono::DateTime;

use crate::auth::error::AuthError;

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

fn rate_limited(resp: &reqwest::Response) -> AuthError {
    let retry_after_ms = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000));
    AuthError::RateLimited { retry_after_ms }
}

/// Expiry as unix seconds from an RFC 3339 string or a numeric epoch
/// (seconds or milliseconds).
fn parse_expires_at(value: &serde_json::Value) -> Result<i64, AuthError> {
    if let Some(num) = value.as_i64() {
        return Ok(normalize_epoch(num));
    }
    if let Some(text) = value.as_str() {
        if let Ok(num) = text.trim().parse::<i64>() {
            return Ok(normalize_epoch(num));
        }
        return DateTime::parse_from_rfc3339(text.trim())
            .map(|dt| dt.timestamp())
            .map_err(|_| AuthError::InvalidResponse(format!("Unrecognized expiresAt: {text}")));
    }
    Err(AuthError::InvalidResponse(
        "Session expiresAt missing".to_string(),
    ))
}

fn normalize_epoch(num: i64) -> i64 {
    if num > 10_000_000_000 {
        num / 1000
    } else {
        num
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_expires_at_accepts_rfc3339() {
        let parsed = parse_expires_at(&json!("2026-01-18T18:40:25Z")).unwrap();
        assert_eq!(parsed, 1_768_761_625);
    }

    #[test]
    fn parse_expires_at_accepts_seconds_and_millis() {
        assert_eq!(parse_expires_at(&json!(1_768_761_625)).unwrap(), 1_768_761_625);
        assert_eq!(
            parse_expires_at(&json!(1_768_761_625_000_i64)).unwrap(),
            1_768_761_625
        );
        assert_eq!(parse_expires_at(&json!("1768761625")).unwrap(), 1_768_761_625);
    }

    #[test]
    fn parse_expires_at_rejects_garbage() {
        assert!(parse_expires_at(&json!("tomorrow")).is_err());
        assert!(parse_expires_at(&json!(null)).is_err());
    }
}
