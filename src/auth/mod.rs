//! OAuth device-code authentication, game sessions, and their lifecycle.

pub mod device_code;
pub mod error;
pub mod oauth;
pub mod profile;
pub mod providers;
pub mod refresh;
pub mod service;
pub mod session;
pub mod store;
pub mod token;

pub use device_code::{DeviceCodePoll, DeviceCodeSession};
pub use error::AuthError;
pub use oauth::OAuthClient;
pub use profile::{DefaultProfileManager, ProfileManager};
pub use refresh::{BackgroundRefresh, RefreshReport, TickOutcome};
pub use service::{AuthService, TokenStatus};
pub use session::SessionManager;
pub use store::{Artifact, FileTokenStore, TokenStore, TokenStoreConfig, TokenStoreExt};
pub use token::{OAuthTokens, Profile, ProfileList, SelectedProfile, SelectionSource, SessionTokens};
