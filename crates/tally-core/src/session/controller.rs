use crate::{
    CoreResult, SessionError,
    capture::{CaptureBackend, CaptureEvent, FinalizeResult},
    notify::{EventNotifier, NotificationPresenter, format_elapsed},
    session::{
        RecordingConfig, RecordingState, SessionCommand, event::SessionEvent, guard::ResourceGuard,
        monitor::DurationMonitor,
    },
    wake::WakeSource,
};

use std::{panic::Location, sync::Arc, time::Duration};

use error_location::ErrorLocation;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Bound on the wait for the backend's finalized confirmation after a stop
/// request. Long enough for an encoder to flush its trailer, short enough
/// that a hung backend cannot park the session in Stopping; on expiry the
/// resources are force-released.
pub const FINALIZE_TIMEOUT: Duration = Duration::from_secs(5);

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 64;

/// Cheap-to-clone handle for commanding a running controller and observing
/// its state.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    state_rx: watch::Receiver<RecordingState>,
}

impl SessionHandle {
    /// Request a new session with the given parameters. Ignored by the
    /// controller unless it is idle (or parked in an error state).
    pub async fn start(&self, config: RecordingConfig) -> CoreResult<()> {
        self.send(SessionCommand::Start { config }).await
    }

    /// Request the current session to stop. Ignored unless recording.
    pub async fn stop(&self) -> CoreResult<()> {
        self.send(SessionCommand::Stop).await
    }

    /// Report a battery reading taken while discharging.
    pub async fn report_battery(&self, percent: u8) -> CoreResult<()> {
        self.send(SessionCommand::ReportBattery { percent }).await
    }

    /// Stop any active session, then terminate the controller loop.
    pub async fn shutdown(&self) -> CoreResult<()> {
        self.send(SessionCommand::Shutdown).await
    }

    /// Snapshot of the current session state.
    pub fn state(&self) -> RecordingState {
        self.state_rx.borrow().clone()
    }

    /// Observable stream of session states.
    pub fn watch(&self) -> watch::Receiver<RecordingState> {
        self.state_rx.clone()
    }

    async fn send(&self, command: SessionCommand) -> CoreResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::ControllerClosed {
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

/// Book-keeping for the session currently in flight.
struct ActiveSession {
    id: Uuid,
    config: RecordingConfig,
    monitor: Option<DurationMonitor>,
    forwarder: Option<JoinHandle<()>>,
}

/// The session state machine.
///
/// Owns the resource guard and the duration monitor, and is the only thing
/// that ever mutates session state. Commands from any surface, backend
/// events, monitor ticks and battery reports all join one serialized queue,
/// so transitions apply in delivery order and observers only ever see
/// states from the transition table.
pub struct SessionController {
    guard: ResourceGuard,
    notifier: EventNotifier,
    notifier_task: JoinHandle<()>,
    commands: mpsc::Receiver<SessionCommand>,
    commands_open: bool,
    events_tx: mpsc::Sender<SessionEvent>,
    events: mpsc::Receiver<SessionEvent>,
    state_tx: watch::Sender<RecordingState>,
    session: Option<ActiveSession>,
    finalize_deadline: Option<Instant>,
    shutting_down: bool,
}

impl SessionController {
    /// Build a controller and the handle for talking to it. Must be called
    /// from within a runtime; the controller does nothing until [`run`] is
    /// awaited.
    ///
    /// [`run`]: SessionController::run
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        wake: Arc<dyn WakeSource>,
        presenter: Arc<dyn NotificationPresenter>,
    ) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events_tx, events) = mpsc::channel(EVENT_BUFFER);
        let (state_tx, state_rx) = watch::channel(RecordingState::Idle);
        let (notifier, notifier_task) = EventNotifier::spawn(presenter);

        let controller = Self {
            guard: ResourceGuard::new(backend, wake),
            notifier,
            notifier_task,
            commands: command_rx,
            commands_open: true,
            events_tx,
            events,
            state_tx,
            session: None,
            finalize_deadline: None,
            shutting_down: false,
        };

        let handle = SessionHandle {
            commands: command_tx,
            state_rx,
        };

        (controller, handle)
    }

    /// Run the controller loop until shutdown.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        info!("Session controller running");

        loop {
            tokio::select! {
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(command) => {
                        if self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        info!("All session handles dropped");
                        self.commands_open = false;
                        self.shutting_down = true;
                        self.begin_stop("all handles dropped").await;
                    }
                },

                Some(event) = self.events.recv() => {
                    self.handle_event(event).await;
                }

                _ = wait_until(self.finalize_deadline), if self.finalize_deadline.is_some() => {
                    self.handle_finalize_timeout().await;
                }

                else => {
                    info!("All channels closed, shutting down");
                    break;
                }
            }

            if self.shutting_down && !self.current_state().is_active() {
                break;
            }
        }

        self.finish().await;
        info!("Session controller stopped");
    }

    /// Returns true when the loop should exit.
    async fn handle_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Start { config } => {
                self.handle_start(config).await;
                false
            }
            SessionCommand::Stop => {
                self.begin_stop("stop requested").await;
                false
            }
            SessionCommand::ReportBattery { percent } => {
                self.handle_battery(percent).await;
                false
            }
            SessionCommand::Shutdown => {
                info!("Shutdown requested");
                self.shutting_down = true;
                if self.current_state().is_active() {
                    // Drive the normal teardown; the loop exits once the
                    // session reaches a terminal state.
                    self.begin_stop("shutting down").await;
                    false
                } else {
                    true
                }
            }
        }
    }

    #[instrument(skip(self, config))]
    async fn handle_start(&mut self, config: RecordingConfig) {
        let state = self.current_state();
        if !state.accepts_start() {
            debug!(phase = state.phase(), "Ignoring start request, session active");
            return;
        }

        let session_id = Uuid::new_v4();
        info!(
            session_id = %session_id,
            camera = config.camera.display_name(),
            quality = config.quality.display_name(),
            max_duration_minutes = config.max_duration_minutes,
            "Starting recording session"
        );
        self.set_state(RecordingState::Starting);

        match self.guard.acquire(session_id, &config).await {
            Ok(capture_events) => {
                let forwarder =
                    spawn_forwarder(session_id, capture_events, self.events_tx.clone());
                self.session = Some(ActiveSession {
                    id: session_id,
                    config,
                    monitor: None,
                    forwarder: Some(forwarder),
                });
                // Recording is entered only on the backend's own started
                // event, which arrives on the queue like everything else.
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Failed to start session");
                self.session = None;
                self.set_state(RecordingState::Error {
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Begin teardown of a recording session. No-op in any other phase.
    async fn begin_stop(&mut self, cause: &str) {
        let state = self.current_state();
        if !matches!(state, RecordingState::Recording { .. }) {
            debug!(phase = state.phase(), cause, "Ignoring stop request");
            return;
        }

        info!(cause, "Stopping recording session");
        self.set_state(RecordingState::Stopping);

        // The monitor is canceled and joined first so no tick can
        // interleave with teardown.
        if let Some(session) = self.session.as_mut() {
            if let Some(monitor) = session.monitor.take() {
                monitor.cancel().await;
            }
        }

        self.guard.request_stop().await;
        self.finalize_deadline = Some(Instant::now() + FINALIZE_TIMEOUT);
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Capture { session_id, event } => {
                if self.is_current(session_id) {
                    self.handle_capture_event(event).await;
                } else {
                    debug!(session_id = %session_id, "Discarding event from finished session");
                }
            }
            SessionEvent::CaptureClosed { session_id } => {
                if self.is_current(session_id) {
                    self.handle_capture_closed().await;
                }
            }
            SessionEvent::Tick {
                session_id,
                elapsed,
            } => {
                if self.is_current(session_id)
                    && matches!(self.current_state(), RecordingState::Recording { .. })
                {
                    self.notifier.elapsed(format_elapsed(elapsed));
                }
            }
            SessionEvent::DurationReached { session_id } => {
                if self.is_current(session_id) {
                    info!(session_id = %session_id, "Maximum duration reached");
                    self.begin_stop("maximum duration reached").await;
                }
            }
        }
    }

    async fn handle_capture_event(&mut self, event: CaptureEvent) {
        match (self.current_state(), event) {
            (RecordingState::Starting, CaptureEvent::Started { output }) => {
                let started_at = Instant::now();
                info!(output = %output.display(), "Backend confirmed recording start");
                self.set_state(RecordingState::Recording { started_at, output });

                if let Some(session) = self.session.as_mut() {
                    session.monitor = Some(DurationMonitor::start(
                        session.id,
                        started_at,
                        session.config.max_duration(),
                        self.events_tx.clone(),
                    ));
                }

                if self.shutting_down {
                    self.begin_stop("shutting down").await;
                }
            }

            (RecordingState::Starting, CaptureEvent::Fault { reason }) => {
                error!(reason = %reason, "Backend fault during startup");
                self.fail_session(reason).await;
            }

            (
                RecordingState::Recording { started_at, .. },
                CaptureEvent::Status { bytes_recorded },
            ) => {
                debug!(bytes_recorded, "Capture status");
                self.notifier.elapsed(format_elapsed(started_at.elapsed()));
            }

            (RecordingState::Recording { .. }, CaptureEvent::Finalized(result)) => {
                // The backend ended the session on its own: storage
                // exhausted, an internal limit, or the device went away.
                match result {
                    FinalizeResult::Saved { output } => {
                        warn!(output = %output.display(), "Backend finalized without a stop request");
                        self.complete_stop().await;
                    }
                    FinalizeResult::Failed { reason } => {
                        error!(reason = %reason, "Backend failed mid-recording");
                        self.fail_session(reason).await;
                    }
                }
            }

            (RecordingState::Stopping, CaptureEvent::Finalized(result)) => {
                match result {
                    FinalizeResult::Saved { output } => {
                        info!(output = %output.display(), "Recording finalized");
                    }
                    // A finalize failure closes the session all the same;
                    // it is logged, not escalated.
                    FinalizeResult::Failed { reason } => {
                        error!(reason = %reason, "Backend reported finalize failure");
                    }
                }
                self.complete_stop().await;
            }

            (state, event) => {
                debug!(phase = state.phase(), event = ?event, "Event is a no-op in this phase");
            }
        }
    }

    async fn handle_capture_closed(&mut self) {
        match self.current_state() {
            RecordingState::Starting => {
                error!("Capture backend closed before starting");
                self.fail_session("capture backend closed before starting".to_string())
                    .await;
            }
            RecordingState::Recording { .. } => {
                error!("Capture backend closed unexpectedly");
                self.fail_session("capture backend closed unexpectedly".to_string())
                    .await;
            }
            RecordingState::Stopping => {
                warn!("Capture backend closed without finalizing");
                self.complete_stop().await;
            }
            _ => {}
        }
    }

    async fn handle_finalize_timeout(&mut self) {
        warn!(
            timeout_secs = FINALIZE_TIMEOUT.as_secs(),
            "Backend did not finalize in time, forcing resource release"
        );
        self.complete_stop().await;
    }

    async fn handle_battery(&mut self, percent: u8) {
        if !matches!(self.current_state(), RecordingState::Recording { .. }) {
            return;
        }

        let threshold = self.session.as_ref().and_then(|session| {
            session
                .config
                .stop_at_low_battery
                .then_some(session.config.low_battery_threshold)
        });

        if let Some(threshold) = threshold {
            if percent <= threshold {
                warn!(percent, threshold, "Battery below threshold, stopping session");
                self.begin_stop("battery low").await;
            }
        }
    }

    /// Close out the session into Idle, releasing whatever is still held.
    async fn complete_stop(&mut self) {
        self.finalize_deadline = None;

        if let Some(session) = self.session.as_mut() {
            if let Some(monitor) = session.monitor.take() {
                monitor.cancel().await;
            }
        }

        self.guard.release().await;
        self.clear_session();
        self.set_state(RecordingState::Idle);
    }

    /// Close out the session into Error, releasing whatever is still held.
    async fn fail_session(&mut self, reason: String) {
        self.finalize_deadline = None;

        if let Some(session) = self.session.as_mut() {
            if let Some(monitor) = session.monitor.take() {
                monitor.cancel().await;
            }
        }

        self.guard.release().await;
        self.clear_session();
        self.set_state(RecordingState::Error { reason });
    }

    fn clear_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Some(forwarder) = session.forwarder.take() {
                // Anything it still had in flight is filtered out by
                // session id.
                forwarder.abort();
            }
        }
    }

    fn set_state(&self, next: RecordingState) {
        let previous = self.state_tx.send_replace(next.clone());
        debug!(from = previous.phase(), to = next.phase(), "Session state changed");
        self.notifier.state_changed(&next);
    }

    fn current_state(&self) -> RecordingState {
        self.state_tx.borrow().clone()
    }

    fn is_current(&self, session_id: Uuid) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.id == session_id)
    }

    async fn finish(self) {
        drop(self.notifier);

        match time::timeout(Duration::from_secs(1), self.notifier_task).await {
            Ok(Ok(())) => info!("Notifier stopped cleanly"),
            Ok(Err(e)) => error!(error = ?e, "Notifier task panicked"),
            Err(_) => warn!("Notifier did not stop within timeout"),
        }
    }
}

/// Pipe a session's capture events into the controller queue, tagged with
/// the session id. Ends when the backend drops its sender; a close without
/// a finalized event is reported so the controller can decide what it means
/// for the current phase.
fn spawn_forwarder(
    session_id: Uuid,
    mut capture_events: mpsc::Receiver<CaptureEvent>,
    events_tx: mpsc::Sender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = capture_events.recv().await {
            if events_tx
                .send(SessionEvent::Capture { session_id, event })
                .await
                .is_err()
            {
                return;
            }
        }

        let _ = events_tx
            .send(SessionEvent::CaptureClosed { session_id })
            .await;
    })
}

/// Sleep until the deadline; pending forever when there is none. The select
/// guard keeps this from being polled without a deadline.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
