//! Desktop notifications through the XDG notification daemon.

use async_trait::async_trait;
use notify_rust::{Notification, Timeout};
use tally_core::{Notice, NoticeAction, NotificationPresenter};
use tracing::instrument;

/// Fixed notification id. Reusing it replaces the bubble in place instead
/// of stacking a new one per state change.
const NOTIFICATION_ID: u32 = 0x7a11;

const NOTICE_TIMEOUT_MS: u32 = 5_000;

/// [`NotificationPresenter`] that talks to the desktop notification daemon.
///
/// The stop action is presentational only; actual stop commands arrive over
/// HTTP or signals.
pub(crate) struct DesktopPresenter;

#[async_trait]
impl NotificationPresenter for DesktopPresenter {
    #[instrument(skip(self, notice))]
    async fn show(&self, notice: Notice) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // notify-rust blocks on the bus round-trip.
        tokio::task::spawn_blocking(move || {
            let mut notification = Notification::new();

            notification
                .appname("tally")
                .id(NOTIFICATION_ID)
                .summary(&notice.title)
                .body(&notice.body)
                .timeout(Timeout::Milliseconds(NOTICE_TIMEOUT_MS));

            if let Some(NoticeAction::Stop) = notice.action {
                notification.action("stop", "Stop");
            }

            notification.show().map(|_| ()).map_err(|e| e.to_string())
        })
        .await??;

        Ok(())
    }
}
