use crate::{
    CoreResult,
    session::{CameraFacing, QualityProfile},
};

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Recommended buffer depth for per-session event streams.
///
/// Backends emit at most a few events per second (one status block plus a
/// monitor-driven tick), so a small buffer absorbs scheduling jitter
/// without hiding a stalled consumer.
pub const CAPTURE_EVENT_BUFFER: usize = 32;

/// An exclusive claim on a capture device, minted by [`CaptureBackend::bind`].
///
/// Opaque to the session layer; backends key their own bookkeeping off the
/// id. Not cloneable, so exactly one owner can hand it back to `unbind`.
#[derive(Debug)]
pub struct DeviceHandle {
    id: Uuid,
}

impl DeviceHandle {
    /// Mint a handle with a fresh id.
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// The backend's key for this claim.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for DeviceHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A recording primitive started on a bound device.
#[derive(Debug)]
pub struct RecordingHandle {
    id: Uuid,
}

impl RecordingHandle {
    /// Mint a handle with a fresh id.
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// The backend's key for this recording.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for RecordingHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Events a backend reports on its per-session stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// The recording primitive is live and writing to `output`. Always the
    /// first event of a stream.
    Started {
        /// The in-progress clip.
        output: PathBuf,
    },
    /// Periodic progress while recording.
    Status {
        /// Bytes written to the output so far.
        bytes_recorded: u64,
    },
    /// The output has been completed, successfully or not. Always the last
    /// event of a stream; the backend drops its sender afterwards.
    Finalized(FinalizeResult),
    /// The backend failed before the recording primitive came up. Only
    /// emitted before `Started`.
    Fault {
        /// Description of the failure.
        reason: String,
    },
}

/// Terminal outcome of a capture stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeResult {
    /// The clip was written and closed.
    Saved {
        /// The completed clip.
        output: PathBuf,
    },
    /// The backend could not complete the clip.
    Failed {
        /// Description of the failure.
        reason: String,
    },
}

/// The subsystem that owns device I/O and encoding.
///
/// The session layer drives this through four calls and never touches the
/// device itself. Implementations must be safe to share across tasks.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Take an exclusive claim on the device selected by `camera`.
    ///
    /// Fails with [`crate::SessionError::DeviceUnavailable`] when the device
    /// is missing or already claimed, by this process or another.
    async fn bind(&self, camera: CameraFacing, quality: QualityProfile)
    -> CoreResult<DeviceHandle>;

    /// Start the recording primitive on a bound device.
    ///
    /// On success the returned receiver yields this session's events,
    /// beginning with [`CaptureEvent::Started`] and ending with
    /// [`CaptureEvent::Finalized`] (or [`CaptureEvent::Fault`] if the
    /// primitive never came up).
    async fn start_recording(
        &self,
        device: &DeviceHandle,
        audio_enabled: bool,
    ) -> CoreResult<(RecordingHandle, mpsc::Receiver<CaptureEvent>)>;

    /// Ask a recording to finish gracefully. Best-effort: confirmation
    /// arrives as a `Finalized` event on the stream, or not at all.
    async fn request_stop(&self, recording: &RecordingHandle);

    /// Release the claim on a device. Any recording primitive still live on
    /// it is aborted first; the claim is gone when this returns.
    async fn unbind(&self, device: DeviceHandle);
}
