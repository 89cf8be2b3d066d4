use crate::capture::CaptureEvent;

use std::time::Duration;

use uuid::Uuid;

/// Internal messages feeding the controller's serialized queue.
///
/// Everything that can influence a session besides a command arrives here:
/// backend events relayed by the forwarder task and ticks from the duration
/// monitor. Each carries the id of the session that produced it so events
/// from an already-finished session are discarded instead of acting on a
/// newer one.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    /// An event from the capture backend's per-session stream.
    Capture {
        session_id: Uuid,
        event: CaptureEvent,
    },
    /// The backend's event stream closed without a finalized event.
    CaptureClosed { session_id: Uuid },
    /// Periodic elapsed-time report from the duration monitor.
    Tick {
        session_id: Uuid,
        elapsed: Duration,
    },
    /// The configured maximum duration has been reached.
    DurationReached { session_id: Uuid },
}
