//! Host process: authenticate, hold a game session, keep both fresh until Ctrl-C.

use hytale_auth::config::AuthConfig;
use hytale_auth::error::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run().await {
        error!(category = ?e.category(), retryable = e.is_retryable(), "{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = AuthConfig::from_env();
    let auth = config.build_service()?;

    let tokens = auth.ensure_downloader_auth().await?;
    info!(expires_in = tokens.remaining_secs(), "Downloader credentials ready");

    // Always start from a fresh session; a cached one may be stale.
    let session = auth.wait_for_session(config.profile_wait_interval).await?;
    info!(expires_in = session.remaining_secs(), "Game session ready");
    auth.print_status();

    if config.auto_refresh_tokens {
        auth.start_background_refresh();
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    auth.stop_background_refresh();
    auth.terminate_session().await;
    Ok(())
}
