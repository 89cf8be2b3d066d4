use crate::{
    CoreResult,
    capture::{CaptureBackend, CaptureEvent, DeviceHandle, RecordingHandle},
    session::RecordingConfig,
    wake::{MAX_WAKE_LIFETIME, WakeSource, WakeToken},
};

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Everything a session holds exclusively while it runs.
struct HeldResources {
    wake_token: WakeToken,
    device: DeviceHandle,
    recording: RecordingHandle,
}

/// Single acquisition and release point for session resources.
///
/// Acquisition order is wake token, device claim, recording primitive; a
/// failure part-way unwinds the earlier steps before the error surfaces, so
/// the caller never sees a half-acquired session. Release is idempotent and
/// runs in reverse order. The guard guarantees release happens at most once
/// per acquisition whatever path teardown takes.
pub(crate) struct ResourceGuard {
    backend: Arc<dyn CaptureBackend>,
    wake: Arc<dyn WakeSource>,
    held: Option<HeldResources>,
}

impl ResourceGuard {
    pub(crate) fn new(backend: Arc<dyn CaptureBackend>, wake: Arc<dyn WakeSource>) -> Self {
        Self {
            backend,
            wake,
            held: None,
        }
    }

    /// Acquire everything a session needs and return its event stream.
    #[instrument(skip(self, config))]
    pub(crate) async fn acquire(
        &mut self,
        session_id: Uuid,
        config: &RecordingConfig,
    ) -> CoreResult<mpsc::Receiver<CaptureEvent>> {
        if self.held.is_some() {
            // The controller's state machine should make this unreachable;
            // release the stale handle rather than leak it.
            warn!("Acquiring with resources already held, releasing stale handle");
            self.release().await;
        }

        let wake_token = self.wake.acquire(MAX_WAKE_LIFETIME).await?;

        let device = match self.backend.bind(config.camera, config.quality).await {
            Ok(device) => device,
            Err(e) => {
                self.wake.release(wake_token).await;
                return Err(e);
            }
        };

        let (recording, events) = match self
            .backend
            .start_recording(&device, config.audio_enabled)
            .await
        {
            Ok(started) => started,
            Err(e) => {
                self.backend.unbind(device).await;
                self.wake.release(wake_token).await;
                return Err(e);
            }
        };

        info!(
            session_id = %session_id,
            camera = config.camera.display_name(),
            quality = config.quality.display_name(),
            audio = config.audio_enabled,
            "Session resources acquired"
        );

        self.held = Some(HeldResources {
            wake_token,
            device,
            recording,
        });

        Ok(events)
    }

    /// Ask the held recording, if any, to finish gracefully.
    pub(crate) async fn request_stop(&self) {
        if let Some(held) = &self.held {
            self.backend.request_stop(&held.recording).await;
        }
    }

    /// Release whatever is held, in reverse acquisition order. Safe to call
    /// any number of times; only the first call after an acquisition does
    /// anything.
    #[instrument(skip(self))]
    pub(crate) async fn release(&mut self) {
        let Some(held) = self.held.take() else {
            return;
        };

        // Unbind tears down the recording primitive with the device claim;
        // the wake token goes last, mirroring acquisition.
        self.backend.unbind(held.device).await;
        self.wake.release(held.wake_token).await;

        info!("Session resources released");
    }
}
