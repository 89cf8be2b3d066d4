use std::path::PathBuf;

use tokio::time::Instant;

/// Observable phase of the capture session.
///
/// A closed sum type: every phase the controller can be in is a variant
/// here, and the controller publishes exactly one value at a time through
/// its watch channel. There are no side flags to fall out of sync with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingState {
    /// No session. Initial state, and the terminal state of every
    /// successful or cleanly-stopped session.
    Idle,
    /// Resources are being acquired and the backend is binding. Transient.
    Starting,
    /// Backend confirmed the recording primitive is live.
    Recording {
        /// Captured when the backend reported its started event.
        started_at: Instant,
        /// The in-progress output clip, as reported by the backend.
        output: PathBuf,
    },
    /// Teardown in progress, waiting for the backend to finalize. Transient.
    Stopping,
    /// The session failed. Terminal until a fresh start request.
    Error {
        /// Human-diagnosable cause.
        reason: String,
    },
}

impl RecordingState {
    /// True while a session holds (or is acquiring) resources.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RecordingState::Starting | RecordingState::Recording { .. } | RecordingState::Stopping
        )
    }

    /// True for the states a start request is honored from.
    pub fn accepts_start(&self) -> bool {
        matches!(self, RecordingState::Idle | RecordingState::Error { .. })
    }

    /// Short lowercase name for logs and status reporting.
    pub fn phase(&self) -> &'static str {
        match self {
            RecordingState::Idle => "idle",
            RecordingState::Starting => "starting",
            RecordingState::Recording { .. } => "recording",
            RecordingState::Stopping => "stopping",
            RecordingState::Error { .. } => "error",
        }
    }
}
