use crate::session::event::SessionEvent;

use std::time::Duration;

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Cancelable once-a-second elapsed-time ticker for one session.
///
/// Runs as its own task. Each tick reports the elapsed time since the
/// session started; when a maximum duration is configured and the elapsed
/// time crosses it, a single threshold event is delivered and the task ends
/// on its own. The controller owns the monitor and cancels it during
/// teardown.
pub(crate) struct DurationMonitor {
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DurationMonitor {
    /// Start ticking against `started_at`. Must be called from within a
    /// runtime.
    #[instrument(skip(started_at, events))]
    pub(crate) fn start(
        session_id: Uuid,
        started_at: Instant,
        max_duration: Option<Duration>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(started_at + TICK_PERIOD, TICK_PERIOD);

            loop {
                tokio::select! {
                    _ = cancel_rx.changed() => break,

                    _ = ticker.tick() => {
                        let elapsed = started_at.elapsed();

                        // Ticks are presentation-only; drop rather than
                        // stall when the queue is briefly full.
                        let _ = events.try_send(SessionEvent::Tick { session_id, elapsed });

                        if max_duration.is_some_and(|max| elapsed >= max) {
                            debug!(
                                session_id = %session_id,
                                elapsed_secs = elapsed.as_secs(),
                                "Maximum duration crossed"
                            );
                            // The threshold event must not be lost; wait for
                            // queue space unless canceled in the meantime.
                            tokio::select! {
                                _ = cancel_rx.changed() => {}
                                _ = events.send(SessionEvent::DurationReached { session_id }) => {}
                            }
                            break;
                        }
                    }
                }
            }
        });

        Self { cancel_tx, task }
    }

    /// Cancel the monitor and wait for its task to end.
    ///
    /// After this returns no further tick or threshold event can be
    /// delivered, including from a monitor that already self-terminated.
    pub(crate) async fn cancel(self) {
        let _ = self.cancel_tx.send(true);

        if let Err(e) = self.task.await {
            warn!(error = ?e, "Duration monitor task failed");
        }
    }
}
