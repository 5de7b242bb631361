use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use strum::{Display, EnumIter, IntoEnumIterator};

use super::error::AuthError;
use super::token::{OAuthTokens, ProfileList, SelectedProfile, SessionTokens};

/// The four persisted credential artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Artifact {
    OauthTokens,
    SessionTokens,
    Profiles,
    SelectedProfile,
}

impl Artifact {
    pub fn file_name(self) -> String {
        format!("{self}.json")
    }
}

/// Durable storage for credential artifacts.
///
/// Every operation is atomic at artifact granularity: a reader sees either the
/// previous record or the new one, never a mix.
pub trait TokenStore: Send + Sync {
    fn load(&self, artifact: Artifact) -> Result<Option<serde_json::Value>, AuthError>;
    fn save(&self, artifact: Artifact, value: &serde_json::Value) -> Result<(), AuthError>;
    fn clear(&self, artifact: Artifact) -> Result<(), AuthError>;

    /// Remove every artifact.
    fn clear_all(&self) -> Result<(), AuthError> {
        for artifact in Artifact::iter() {
            self.clear(artifact)?;
        }
        Ok(())
    }
}

/// Typed accessors over [`TokenStore`].
pub trait TokenStoreExt: TokenStore {
    fn load_oauth_tokens(&self) -> Result<Option<OAuthTokens>, AuthError> {
        load_typed(self, Artifact::OauthTokens)
    }

    fn save_oauth_tokens(&self, tokens: &OAuthTokens) -> Result<(), AuthError> {
        save_typed(self, Artifact::OauthTokens, tokens)
    }

    fn load_session_tokens(&self) -> Result<Option<SessionTokens>, AuthError> {
        load_typed(self, Artifact::SessionTokens)
    }

    fn save_session_tokens(&self, tokens: &SessionTokens) -> Result<(), AuthError> {
        save_typed(self, Artifact::SessionTokens, tokens)
    }

    fn load_profiles(&self) -> Result<Option<ProfileList>, AuthError> {
        load_typed(self, Artifact::Profiles)
    }

    fn save_profiles(&self, profiles: &ProfileList) -> Result<(), AuthError> {
        save_typed(self, Artifact::Profiles, profiles)
    }

    fn load_selected_profile(&self) -> Result<Option<SelectedProfile>, AuthError> {
        load_typed(self, Artifact::SelectedProfile)
    }

    fn save_selected_profile(&self, profile: &SelectedProfile) -> Result<(), AuthError> {
        save_typed(self, Artifact::SelectedProfile, profile)
    }
}

impl<T: TokenStore + ?Sized> TokenStoreExt for T {}

fn load_typed<S, T>(store: &S, artifact: Artifact) -> Result<Option<T>, AuthError>
where
    S: TokenStore + ?Sized,
    T: DeserializeOwned,
{
    store
        .load(artifact)?
        .map(serde_json::from_value)
        .transpose()
        .map_err(AuthError::from)
}

fn save_typed<S, T>(store: &S, artifact: Artifact, value: &T) -> Result<(), AuthError>
where
    S: TokenStore + ?Sized,
    T: Serialize,
{
    store.save(artifact, &serde_json::to_value(value)?)
}

/// Configuration for file-backed token storage.
#[derive(Debug, Clone)]
pub struct TokenStoreConfig {
    pub base_dir: PathBuf,
}

impl TokenStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }
}

/// File-backed token store, one JSON document per artifact.
///
/// # Example
/// ```no_run
/// use hytale_auth::auth::{FileTokenStore, OAuthTokens, TokenStoreConfig, TokenStoreExt};
///
/// let store = FileTokenStore::new(TokenStoreConfig::new("/server/.hytale/tokens".into()));
/// store.save_oauth_tokens(&OAuthTokens::new("access", "refresh", 1_700_000_000))?;
/// # Ok::<(), hytale_auth::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(config: TokenStoreConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn artifact_path(&self, artifact: Artifact) -> PathBuf {
        self.base_dir.join(artifact.file_name())
    }

    fn ensure_dir(&self) -> Result<(), AuthError> {
        fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, artifact: Artifact) -> Result<Option<serde_json::Value>, AuthError> {
        let path = self.artifact_path(artifact);
        let raw = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, artifact: Artifact, value: &serde_json::Value) -> Result<(), AuthError> {
        self.ensure_dir()?;
        let path = self.artifact_path(artifact);
        let tmp = path.with_extension("json.tmp");
        let serialized = serde_json::to_string_pretty(value)?;
        fs::write(&tmp, serialized)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn clear(&self, artifact: Artifact) -> Result<(), AuthError> {
        match fs::remove_file(self.artifact_path(artifact)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }
}
