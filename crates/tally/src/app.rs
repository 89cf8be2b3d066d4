use crate::{
    AppResult, DesktopPresenter, FfmpegBackend, NoopWakeSource, SignalHandler, SleepInhibitor,
    api::{self, ApiState},
    battery,
    config::Config,
    library::ClipLibrary,
};

use std::{sync::Arc, time::Duration};

use tally_core::{CaptureBackend, NotificationPresenter, SessionController, WakeSource};
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

/// The assembled daemon.
///
/// Wires the session controller to its collaborators, runs the control
/// surfaces, and tears everything down when a shutdown signal arrives.
pub struct App {
    config: Config,
}

impl App {
    pub(crate) fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the daemon until a shutdown signal is received.
    #[instrument(skip(self))]
    pub(crate) async fn run(self) -> AppResult<()> {
        info!("Tally starting");

        let clips_dir = self.config.clips_dir()?;
        let claim_dir = Config::claim_dir()?;

        let backend = Arc::new(FfmpegBackend::new(
            self.config.capture.clone(),
            clips_dir.clone(),
            claim_dir,
        )?);

        let wake: Arc<dyn WakeSource> = match SleepInhibitor::detect() {
            Some(inhibitor) => Arc::new(inhibitor),
            None => Arc::new(NoopWakeSource),
        };

        let (controller, handle) = SessionController::new(
            backend as Arc<dyn CaptureBackend>,
            wake,
            Arc::new(DesktopPresenter) as Arc<dyn NotificationPresenter>,
        );
        let controller_task = tokio::spawn(controller.run());

        let battery_task = battery::spawn(handle.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let api_state = ApiState {
            handle: handle.clone(),
            defaults: self.config.recording.clone(),
            library: Arc::new(ClipLibrary::new(clips_dir)),
        };
        let listen_addr = self.config.listen_addr();
        let server_task = tokio::spawn(async move {
            if let Err(e) = api::serve(listen_addr, api_state, shutdown_rx).await {
                error!(error = %e, "Control surface failed");
            }
        });

        info!("Tally ready; SIGUSR1 starts a recording, SIGUSR2 stops it");

        // Blocks until SIGINT or SIGTERM.
        let signal_result = SignalHandler::new(handle.clone(), self.config.recording.clone())
            .run()
            .await;

        // Teardown order matters: the controller stops the active session
        // (releasing device and wake holds) before the surfaces go away.
        if let Err(e) = handle.shutdown().await {
            warn!(error = %e, "Controller already stopped");
        }

        match controller_task.await {
            Ok(()) => info!("Session controller stopped cleanly"),
            Err(e) => error!(error = ?e, "Session controller task panicked"),
        }

        let _ = shutdown_tx.send(true);

        match tokio::time::timeout(Duration::from_secs(1), server_task).await {
            Ok(Ok(())) => info!("Control surface stopped cleanly"),
            Ok(Err(e)) => error!(error = ?e, "Control surface task panicked"),
            Err(_) => info!(
                "Control surface did not stop within timeout, \
                     will be cleaned up on exit"
            ),
        }

        battery_task.abort();

        signal_result?;

        info!("Tally shut down successfully");

        Ok(())
    }
}
