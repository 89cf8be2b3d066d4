//! Unix signal handling for headless control.
//!
//! `SIGUSR1` starts a session with the stored defaults, `SIGUSR2` stops it,
//! and `SIGINT`/`SIGTERM` shut the daemon down. This is the control path
//! that needs no HTTP client, e.g. a window manager keybinding running
//! `pkill -USR1 tally`.

use crate::AppResult;

use tally_core::{RecordingConfig, SessionHandle};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, instrument};

/// Signal-driven session control.
pub struct SignalHandler {
    handle: SessionHandle,
    defaults: RecordingConfig,
}

impl SignalHandler {
    pub(crate) fn new(handle: SessionHandle, defaults: RecordingConfig) -> Self {
        Self { handle, defaults }
    }

    /// Run the signal loop.
    ///
    /// This method blocks until a shutdown signal is received.
    #[instrument(skip(self))]
    pub async fn run(self) -> AppResult<()> {
        let mut start = signal(SignalKind::user_defined1())?;
        let mut stop = signal(SignalKind::user_defined2())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;

        loop {
            tokio::select! {
                _ = start.recv() => {
                    info!("SIGUSR1 received, starting a session");
                    self.handle.start(self.defaults.clone()).await?;
                }
                _ = stop.recv() => {
                    info!("SIGUSR2 received, stopping the session");
                    self.handle.stop().await?;
                }
                _ = interrupt.recv() => {
                    info!("SIGINT received, shutting down");
                    break;
                }
                _ = terminate.recv() => {
                    info!("SIGTERM received, shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
