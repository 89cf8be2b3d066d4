use error_location::ErrorLocation;
use thiserror::Error;

/// Session lifecycle errors with source location tracking.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Capture device missing, busy, or claimed by another session.
    #[error("Capture device unavailable: {reason} {location}")]
    DeviceUnavailable {
        /// Description of why the bind failed.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Recording primitive failed to start on a bound device.
    #[error("Recording failed to start: {reason} {location}")]
    StartFailed {
        /// Description of the start failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Wake source could not hand out a token.
    #[error("Wake acquisition failed: {reason} {location}")]
    WakeAcquireFailed {
        /// Description of the wake failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Command sent to a controller whose run loop has exited.
    #[error("Session controller is no longer running {location}")]
    ControllerClosed {
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

/// Result type alias using [`SessionError`].
pub type Result<T> = std::result::Result<T, SessionError>;
