//! Recurring token refresh task and its per-tick report.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Period between background refresh ticks.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// What one check inside a refresh tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing cached, or nothing close to expiry.
    Skipped,
    /// Existing credentials were extended in place.
    Refreshed,
    /// The session could not be extended and a new one was created.
    Recreated,
    /// The check failed; the next tick retries.
    Failed(String),
}

impl TickOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => f.write_str("skipped"),
            Self::Refreshed => f.write_str("refreshed"),
            Self::Recreated => f.write_str("recreated"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Result of one background tick. Both checks always run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub session: TickOutcome,
    pub oauth: TickOutcome,
}

impl RefreshReport {
    /// True when neither check had anything to do.
    pub fn is_idle(&self) -> bool {
        self.session == TickOutcome::Skipped && self.oauth == TickOutcome::Skipped
    }

    pub fn log(&self) {
        for (check, outcome) in [("session", &self.session), ("oauth", &self.oauth)] {
            match outcome {
                TickOutcome::Skipped => {}
                TickOutcome::Failed(reason) => {
                    warn!(check, reason = %reason, "Token refresh failed")
                }
                other => info!(check, outcome = %other, "Background token refresh"),
            }
        }
        if self.is_idle() {
            debug!("Background refresh tick: nothing to do");
        }
    }
}

/// Handle to the recurring refresh task.
///
/// Each tick runs as its own task, so a slow tick never delays the next one
/// and cancelling the handle leaves an in-flight tick to finish. Dropping the
/// handle cancels future ticks.
pub struct BackgroundRefresh {
    cancel: CancellationToken,
}

impl BackgroundRefresh {
    /// Start ticking every `period`, first tick one period from now.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F, Fut>(period: Duration, tick: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = RefreshReport> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let run = tick();
                        tokio::spawn(async move {
                            run.await.log();
                        });
                    }
                }
            }
        });
        Self { cancel }
    }

    /// Cancel future ticks.
    pub fn stop(self) {
        self.cancel.cancel();
    }
}

impl Drop for BackgroundRefresh {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
