//! Sleep inhibition through systemd-logind.

use std::{collections::HashMap, panic::Location, path::PathBuf, process::Stdio, time::Duration};

use async_trait::async_trait;
use error_location::ErrorLocation;
use tally_core::{CoreResult, SessionError, WakeSource, WakeToken};
use tokio::{
    process::{Child, Command},
    sync::Mutex,
};
use tracing::{debug, info, instrument, warn};

/// [`WakeSource`] backed by `systemd-inhibit`.
///
/// Each acquisition spawns `systemd-inhibit --mode=block` wrapping a plain
/// `sleep` equal to the requested lifetime, so the hold expires on its own
/// even if release never runs. Release kills the child, which drops the
/// logind inhibitor lock.
pub(crate) struct SleepInhibitor {
    systemd_inhibit: PathBuf,
    holds: Mutex<HashMap<uuid::Uuid, Child>>,
}

impl SleepInhibitor {
    /// Probe for `systemd-inhibit`. `None` when logind is not around.
    pub(crate) fn detect() -> Option<Self> {
        match which::which("systemd-inhibit") {
            Ok(path) => {
                info!(binary = %path.display(), "Sleep inhibitor ready");
                Some(Self {
                    systemd_inhibit: path,
                    holds: Mutex::new(HashMap::new()),
                })
            }
            Err(e) => {
                warn!(error = %e, "systemd-inhibit not found, recordings will not block sleep");
                None
            }
        }
    }
}

#[async_trait]
impl WakeSource for SleepInhibitor {
    #[instrument(skip(self))]
    async fn acquire(&self, max_lifetime: Duration) -> CoreResult<WakeToken> {
        let child = Command::new(&self.systemd_inhibit)
            .arg("--what=sleep:idle")
            .arg("--who=tally")
            .arg("--why=Recording in progress")
            .arg("--mode=block")
            .arg("sleep")
            .arg(max_lifetime.as_secs().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SessionError::WakeAcquireFailed {
                reason: format!("failed to spawn systemd-inhibit: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let token = WakeToken::new();
        self.holds.lock().await.insert(token.id(), child);

        debug!(token_id = %token.id(), lifetime_secs = max_lifetime.as_secs(), "Wake hold taken");

        Ok(token)
    }

    #[instrument(skip(self, token))]
    async fn release(&self, token: WakeToken) {
        let child = self.holds.lock().await.remove(&token.id());

        match child {
            Some(mut child) => {
                if let Err(e) = child.kill().await {
                    warn!(token_id = %token.id(), error = %e, "Failed to kill inhibitor child");
                }
                debug!(token_id = %token.id(), "Wake hold released");
            }
            None => debug!(token_id = %token.id(), "Wake hold already released"),
        }
    }
}

/// Stand-in wake source for hosts without `systemd-inhibit`.
///
/// Holds are accepted and do nothing, so sessions still run; the host just
/// keeps its normal power management.
pub(crate) struct NoopWakeSource;

#[async_trait]
impl WakeSource for NoopWakeSource {
    async fn acquire(&self, _max_lifetime: Duration) -> CoreResult<WakeToken> {
        Ok(WakeToken::new())
    }

    async fn release(&self, _token: WakeToken) {}
}
