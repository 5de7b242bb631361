//! Profile selection policy.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::AuthError;
use super::store::{TokenStore, TokenStoreExt};
use super::token::{Profile, SelectedProfile, SelectionSource};

/// Decides which profile the server plays as.
#[async_trait]
pub trait ProfileManager: Send + Sync {
    /// Pick a profile out of a freshly fetched list.
    ///
    /// `Ok(None)` means no choice can be made yet (for example an operator has
    /// to pick between several profiles).
    async fn select(&self, profiles: &[Profile]) -> Result<Option<Profile>, AuthError>;

    /// Numbered listing for display, marking `selected_uuid`.
    fn format_list(&self, profiles: &[Profile], selected_uuid: Option<&str>) -> String {
        format_profile_list(profiles, selected_uuid)
    }
}

/// Persisted-selection policy with optional auto-select of the first profile.
///
/// Accounts with a single profile are always auto-selected.
pub struct DefaultProfileManager {
    store: Arc<dyn TokenStore>,
    auto_select: bool,
}

impl DefaultProfileManager {
    pub fn new(store: Arc<dyn TokenStore>, auto_select: bool) -> Self {
        Self { store, auto_select }
    }

    /// Record an operator choice against the cached profile list.
    ///
    /// `input` is either a 1-based position in the list or a profile UUID.
    pub fn select_explicit(&self, input: &str) -> Result<Profile, AuthError> {
        let cached = self.store.load_profiles()?.ok_or_else(|| {
            AuthError::InvalidSelection("no cached profiles; authenticate first".to_string())
        })?;
        let profile = resolve_selection(&cached.profiles, input)?;
        self.store
            .save_selected_profile(&SelectedProfile::from_profile(
                &profile,
                SelectionSource::Operator,
            ))?;
        info!(uuid = %profile.uuid, username = %profile.username, "Profile selected");
        Ok(profile)
    }
}

#[async_trait]
impl ProfileManager for DefaultProfileManager {
    async fn select(&self, profiles: &[Profile]) -> Result<Option<Profile>, AuthError> {
        if profiles.is_empty() {
            warn!("Account has no game profiles");
            return Ok(None);
        }

        if let Some(saved) = self.store.load_selected_profile()? {
            if let Some(profile) = profiles
                .iter()
                .find(|p| p.uuid.eq_ignore_ascii_case(&saved.uuid))
            {
                return Ok(Some(profile.clone()));
            }
            warn!(
                uuid = %saved.uuid,
                "Selected profile no longer belongs to this account; clearing it"
            );
            self.store.clear(super::store::Artifact::SelectedProfile)?;
        }

        if self.auto_select || profiles.len() == 1 {
            let first = profiles[0].clone();
            self.store
                .save_selected_profile(&SelectedProfile::from_profile(
                    &first,
                    SelectionSource::Auto,
                ))?;
            info!(uuid = %first.uuid, username = %first.username, "Auto-selected profile");
            return Ok(Some(first));
        }

        info!(
            "Multiple profiles available, waiting for selection:\n{}",
            self.format_list(profiles, None)
        );
        Ok(None)
    }
}

fn resolve_selection(profiles: &[Profile], input: &str) -> Result<Profile, AuthError> {
    let input = input.trim();
    if let Ok(position) = input.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|idx| profiles.get(idx))
            .cloned()
            .ok_or_else(|| {
                AuthError::InvalidSelection(format!(
                    "{position} is out of range (1-{})",
                    profiles.len()
                ))
            });
    }
    let wanted = Uuid::parse_str(input)
        .map_err(|_| AuthError::InvalidSelection(format!("{input} is not a number or UUID")))?;
    profiles
        .iter()
        .find(|p| Uuid::parse_str(&p.uuid).is_ok_and(|id| id == wanted))
        .cloned()
        .ok_or_else(|| AuthError::InvalidSelection(format!("no profile with UUID {input}")))
}

/// Render profiles as a numbered list, one per line.
pub fn format_profile_list(profiles: &[Profile], selected_uuid: Option<&str>) -> String {
    let mut out = String::new();
    for (idx, profile) in profiles.iter().enumerate() {
        let marker = match selected_uuid {
            Some(uuid) if profile.uuid.eq_ignore_ascii_case(uuid) => " (selected)",
            _ => "",
        };
        let _ = writeln!(
            out,
            "  {}. {} [{}]{marker}",
            idx + 1,
            profile.username,
            profile.uuid
        );
    }
    out
}
