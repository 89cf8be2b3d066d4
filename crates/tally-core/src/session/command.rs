use crate::session::RecordingConfig;

/// Commands accepted by a running session controller.
///
/// Every external trigger, whatever its origin, becomes one of these and
/// joins the controller's serialized queue.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Begin a new recording session with the given parameters.
    Start {
        /// Parameters snapshotted for the lifetime of the session.
        config: RecordingConfig,
    },
    /// Stop the current recording session, if one is active.
    Stop,
    /// A battery reading from the host, in percent. The controller applies
    /// the active session's low-battery policy, if any.
    ReportBattery {
        /// Remaining charge while discharging.
        percent: u8,
    },
    /// Stop any active session, then terminate the controller loop.
    Shutdown,
}
