use crate::session::RecordingState;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

/// Notification title shared by every notice.
pub const NOTICE_TITLE: &str = "Tally";

const NOTICE_BUFFER: usize = 16;

/// A presentation directive derived from session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Summary line.
    pub title: String,
    /// Detail line, e.g. the running elapsed time.
    pub body: String,
    /// Optional action the presenter may render as a button.
    pub action: Option<NoticeAction>,
}

/// Actions a presenter may attach to a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeAction {
    /// Offer to stop the running recording.
    Stop,
}

/// Shows notices to the user. Implementations decide the medium; failures
/// are reported back and logged, never acted on.
#[async_trait]
pub trait NotificationPresenter: Send + Sync {
    /// Display (or replace) the session notice.
    async fn show(&self, notice: Notice) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Fire-and-forget bridge between the controller and the presenter.
///
/// The controller hands notices over with `try_send` and moves on; a
/// dedicated task awaits the presenter so a slow or failing presenter can
/// never stall a state transition. A full buffer drops the notice, which is
/// acceptable for presentation-only traffic.
pub(crate) struct EventNotifier {
    tx: mpsc::Sender<Notice>,
}

impl EventNotifier {
    /// Spawn the presenter task. Must be called from within a runtime.
    pub(crate) fn spawn(presenter: Arc<dyn NotificationPresenter>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Notice>(NOTICE_BUFFER);

        let task = tokio::spawn(async move {
            while let Some(notice) = rx.recv().await {
                if let Err(e) = presenter.show(notice).await {
                    warn!(error = %e, "Notification presenter failed");
                }
            }
        });

        (Self { tx }, task)
    }

    /// Push the notice for a freshly-committed state.
    pub(crate) fn state_changed(&self, state: &RecordingState) {
        self.push(notice_for(state));
    }

    /// Refresh the elapsed-time text of an in-progress recording.
    pub(crate) fn elapsed(&self, text: String) {
        self.push(Notice {
            title: NOTICE_TITLE.to_string(),
            body: format!("Recording\u{2026} {text}"),
            action: Some(NoticeAction::Stop),
        });
    }

    fn push(&self, notice: Notice) {
        if let Err(e) = self.tx.try_send(notice) {
            debug!(error = %e, "Dropping notice");
        }
    }
}

/// Pure mapping from session state to its notice.
pub(crate) fn notice_for(state: &RecordingState) -> Notice {
    let (body, action) = match state {
        RecordingState::Idle => ("Recording stopped".to_string(), None),
        RecordingState::Starting => ("Preparing to record\u{2026}".to_string(), None),
        RecordingState::Recording { .. } => (
            format!("Recording\u{2026} {}", format_elapsed(Duration::ZERO)),
            Some(NoticeAction::Stop),
        ),
        RecordingState::Stopping => ("Saving recording\u{2026}".to_string(), None),
        RecordingState::Error { reason } => (format!("Recording failed: {reason}"), None),
    };

    Notice {
        title: NOTICE_TITLE.to_string(),
        body,
        action,
    }
}

/// Format an elapsed duration as `mm:ss`, minutes unbounded.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("{:02}:{:02}", total / 60, total % 60)
}
