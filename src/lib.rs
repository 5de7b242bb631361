//! hytale-auth: credential and session lifecycle for headless game servers.
//!
//! Acquires OAuth tokens through the device-code flow, layers a profile-scoped
//! game session on top, and keeps both valid for the life of the server
//! process with a background refresh loop.
//!
//! # Quick Start
//!
//! ```no_run
//! use hytale_auth::config::AuthConfig;
//!
//! # async fn example() -> hytale_auth::error::Result<()> {
//! let config = AuthConfig::from_env();
//! let auth = config.build_service()?;
//! let _tokens = auth.ensure_downloader_auth().await?;
//! let _session = auth.wait_for_session(config.profile_wait_interval).await?;
//! auth.start_background_refresh();
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod util;
